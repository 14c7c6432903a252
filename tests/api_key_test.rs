//! API key lifecycle and scope enforcement through the full router.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{spawn_app, token};

#[tokio::test]
async fn created_key_authenticates_within_its_scopes() {
    let app = spawn_app();
    let session = app.register("ada@example.com", "Ada").await;

    let (status, created) = app
        .request(
            "POST",
            "/api-keys",
            Some(token(&session)),
            Some(json!({ "label": "ci", "scopes": ["read:api-keys"] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    let secret = created["key"].as_str().expect("full key");
    assert!(secret.starts_with("sk_"));

    // The key may read the key listing, per its scope
    let (status, listed) = app.request("GET", "/api-keys", Some(secret), None).await;
    assert_eq!(status, StatusCode::OK, "{}", listed);
    let listed = listed.as_array().expect("key list");
    assert_eq!(listed.len(), 1);
    // Listings expose the prefix only, never the secret or hash
    assert_eq!(listed[0]["key_prefix"], created["key_prefix"]);
    assert!(listed[0].get("key").is_none());
    assert!(listed[0].get("key_hash").is_none());

    // Writing is outside the granted scope
    let (status, body) = app
        .request(
            "POST",
            "/api-keys",
            Some(secret),
            Some(json!({ "label": "ci-2", "scopes": ["read:api-keys"] })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Insufficient scope. Required: write:api-keys");
}

#[tokio::test]
async fn key_creation_is_gated_to_admins_and_owners() {
    let app = spawn_app();
    let owner = app.register("owner@example.com", "Olive").await;
    app.register("member@example.com", "Mel").await;

    // Bring the second user in as an ordinary member
    let (status, _) = app
        .request(
            "POST",
            "/team/members",
            Some(token(&owner)),
            Some(json!({ "email": "member@example.com", "role": "member" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let member = app.login("member@example.com").await;
    let (status, member_session) = app
        .request(
            "POST",
            "/auth/switch-team",
            Some(token(&member)),
            Some(json!({ "team_id": owner["team_id"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", member_session);

    let (status, _) = app
        .request(
            "POST",
            "/api-keys",
            Some(token(&member_session)),
            Some(json!({ "label": "ci", "scopes": ["read:projects"] })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invalid_scopes_are_rejected_at_creation() {
    let app = spawn_app();
    let session = app.register("ada@example.com", "Ada").await;

    let (status, body) = app
        .request(
            "POST",
            "/api-keys",
            Some(token(&session)),
            Some(json!({ "label": "ci", "scopes": ["delete:tasks"] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid scope: delete:tasks");
}

#[tokio::test]
async fn revoked_key_stops_authenticating() {
    let app = spawn_app();
    let session = app.register("ada@example.com", "Ada").await;

    let (_, created) = app
        .request(
            "POST",
            "/api-keys",
            Some(token(&session)),
            Some(json!({ "label": "ci", "scopes": ["read:api-keys"] })),
        )
        .await;
    let secret = created["key"].as_str().unwrap();
    let key_id = created["id"].as_str().unwrap();

    let (status, _) = app
        .request(
            "DELETE",
            &format!("/api-keys/{}", key_id),
            Some(token(&session)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // A revoked key is indistinguishable from an unknown one
    let (status, body) = app.request("GET", "/api-keys", Some(secret), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid API key");
}

#[tokio::test]
async fn expired_key_is_rejected() {
    let app = spawn_app();
    let session = app.register("ada@example.com", "Ada").await;

    use chrono::{Duration, Utc};
    use studio_auth::db::CredentialStore;
    use studio_auth::models::ApiKey;
    use studio_auth::services::api_key;

    let generated = api_key::generate();
    let key = ApiKey::new(
        session["user"]["id"].as_str().unwrap().to_string(),
        session["team_id"].as_str().unwrap().to_string(),
        "stale".to_string(),
        generated.prefix.clone(),
        api_key::hash_key(&generated.secret).unwrap(),
        vec!["read:api-keys".to_string()],
        Some(Utc::now() - Duration::hours(1)),
    );
    app.store.insert_api_key(&key).await.unwrap();

    let (status, body) = app
        .request("GET", "/api-keys", Some(&generated.secret), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "API key expired");
}

#[tokio::test]
async fn admin_wildcard_scope_passes_any_check() {
    let app = spawn_app();
    let session = app.register("ada@example.com", "Ada").await;

    let (_, created) = app
        .request(
            "POST",
            "/api-keys",
            Some(token(&session)),
            Some(json!({ "label": "root", "scopes": ["admin"] })),
        )
        .await;
    let secret = created["key"].as_str().unwrap();

    let (status, _) = app.request("GET", "/api-keys", Some(secret), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.request("GET", "/team/members", Some(secret), None).await;
    assert_eq!(status, StatusCode::OK);
}
