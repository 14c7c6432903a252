//! Scope resolver: maps HTTP method + resource to required permission
//! scopes and checks an API key's grants against them.
//!
//! Scopes are `read:<resource>` / `write:<resource>` strings, with `admin`
//! and `*` as full-access wildcards. Only API keys carry scopes; sessions
//! are gated by team role instead.

use axum::http::Method;

/// Map a request path's first segment to its logical resource.
///
/// The alias table is explicit and exhaustive: routes whose path does not
/// match their resource name must be listed here, never inferred.
pub fn resource_from_path(path: &str) -> Option<String> {
    let segment = path.trim_start_matches('/').split('/').next()?;
    if segment.is_empty() {
        return None;
    }
    Some(canonical_resource(segment).to_string())
}

fn canonical_resource(segment: &str) -> &str {
    match segment {
        "project-detail" | "project-archive" => "projects",
        "client-contacts" => "clients",
        "task-assignments" => "tasks",
        "invoice-items" => "invoices",
        "campaign-posts" => "campaigns",
        "calendar" => "calendar-events",
        other => other,
    }
}

/// Scopes required for a method on a resource. Unknown methods require
/// nothing; the caller is expected to reject them as method-not-allowed
/// before scopes matter.
pub fn derive_required_scopes(resource: &str, method: &Method) -> Vec<String> {
    match method.as_str() {
        "GET" => vec![format!("read:{}", resource)],
        "POST" | "PUT" | "PATCH" | "DELETE" => vec![format!("write:{}", resource)],
        _ => Vec::new(),
    }
}

/// True iff every required scope is granted, or the grants include a
/// wildcard.
pub fn check_scopes(granted: &[String], required: &[String]) -> bool {
    if granted.iter().any(|g| g == "admin" || g == "*") {
        return true;
    }
    required.iter().all(|r| granted.iter().any(|g| g == r))
}

/// Validate scope strings supplied at key-creation time.
pub fn is_valid_scope(scope: &str) -> bool {
    if scope == "admin" || scope == "*" {
        return true;
    }
    match scope.split_once(':') {
        Some((verb, resource)) => {
            matches!(verb, "read" | "write") && !resource.is_empty()
        }
        None => false,
    }
}
