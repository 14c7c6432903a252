//! End-to-end session lifecycle: register, login, logout, team switch.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{spawn_app, token};

#[tokio::test]
async fn register_returns_a_working_session_for_a_fresh_team() {
    let app = spawn_app();

    let session = app.register("ada@example.com", "Ada").await;
    assert_eq!(session["token_type"], "Bearer");
    assert_eq!(session["user"]["email"], "ada@example.com");
    assert!(session["team_id"].as_str().is_some());
    // The hash never leaves the service
    assert!(session["user"].get("password_hash").is_none());

    // The fresh token authenticates against a protected route
    let (status, body) = app
        .request("GET", "/team/members", Some(token(&session)), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let members = body.as_array().expect("members array");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["role"], "owner");
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = spawn_app();
    app.register("ada@example.com", "Ada").await;

    let (status, body) = app
        .request(
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "email": "Ada@Example.com",
                "password": "correct-horse-battery",
                "name": "Ada",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email already registered");
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = spawn_app();
    app.register("ada@example.com", "Ada").await;

    let (status1, body1) = app
        .request(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong-password" })),
        )
        .await;
    let (status2, body2) = app
        .request(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "wrong-password" })),
        )
        .await;

    assert_eq!(status1, StatusCode::UNAUTHORIZED);
    assert_eq!(status2, StatusCode::UNAUTHORIZED);
    assert_eq!(body1["error"], body2["error"]);
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let app = spawn_app();
    app.register("ada@example.com", "Ada").await;
    let session = app.login("ada@example.com").await;
    let tok = token(&session);

    let (status, _) = app.request("POST", "/auth/logout", Some(tok), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.request("GET", "/team/members", Some(tok), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Session has been revoked");
}

#[tokio::test]
async fn switch_team_supersedes_the_old_session() {
    let app = spawn_app();
    let first = app.register("ada@example.com", "Ada").await;

    // A second team the user owns
    let other = studio_auth::models::Team::new(
        "Side Project".to_string(),
        first["user"]["id"].as_str().unwrap().to_string(),
    );
    {
        use studio_auth::db::CredentialStore;
        app.store.insert_team(&other).await.unwrap();
    }

    let session = app.login("ada@example.com").await;
    let old = token(&session);

    let (status, switched) = app
        .request(
            "POST",
            "/auth/switch-team",
            Some(old),
            Some(json!({ "team_id": other.id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", switched);
    assert_eq!(switched["team_id"], other.id.as_str());

    // Old session is revoked, new one works
    let (status, _) = app.request("GET", "/team/members", Some(old), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .request("GET", "/team/members", Some(token(&switched)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn switch_to_a_foreign_team_is_forbidden() {
    let app = spawn_app();
    app.register("ada@example.com", "Ada").await;
    let stranger = app.register("bob@example.com", "Bob").await;

    let session = app.login("ada@example.com").await;
    let (status, body) = app
        .request(
            "POST",
            "/auth/switch-team",
            Some(token(&session)),
            Some(json!({ "team_id": stranger["team_id"] })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Not a member of this team");
}

#[tokio::test]
async fn missing_or_garbled_credentials_are_unauthorized() {
    let app = spawn_app();

    let (status, body) = app.request("GET", "/team/members", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing or invalid Authorization header");

    let (status, body) = app
        .request("GET", "/team/members", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid session token");
}

#[tokio::test]
async fn validation_errors_are_unprocessable() {
    let app = spawn_app();
    let (status, body) = app
        .request(
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "email": "not-an-email",
                "password": "short",
                "name": "Ada",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Validation error");
}
