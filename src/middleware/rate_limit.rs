//! Per-route-group rate limiting keyed by caller identity.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::error::AuthError;
use crate::services::{AuthContext, RateCategory};
use crate::AppState;

/// Limit requests in `category`. Runs after authentication on protected
/// routes so the key is the caller's user id; on anonymous routes it falls
/// back to the client IP.
pub async fn rate_limit_middleware(
    State((state, category)): State<(AppState, RateCategory)>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let key = req
        .extensions()
        .get::<AuthContext>()
        .map(|ctx| ctx.user_id.clone())
        .or_else(|| client_ip(req.headers()))
        .unwrap_or_else(|| "unknown".to_string());

    state.rate_limiter.check(&key, category).await?;
    Ok(next.run(req).await)
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}
