//! Team role gate through the full router.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{spawn_app, token, TestApp};

/// Owner plus an admin and a member, all active in the owner's team.
/// Returns (owner_session, admin_session, member_session).
async fn seed_team(app: &TestApp) -> (Value, Value, Value) {
    let owner = app.register("owner@example.com", "Olive").await;
    app.register("admin@example.com", "Ada").await;
    app.register("member@example.com", "Mel").await;

    for (email, role) in [("admin@example.com", "admin"), ("member@example.com", "member")] {
        let (status, body) = app
            .request(
                "POST",
                "/team/members",
                Some(token(&owner)),
                Some(json!({ "email": email, "role": role })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }

    let mut sessions = Vec::new();
    for email in ["admin@example.com", "member@example.com"] {
        let login = app.login(email).await;
        let (status, switched) = app
            .request(
                "POST",
                "/auth/switch-team",
                Some(token(&login)),
                Some(json!({ "team_id": owner["team_id"] })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", switched);
        sessions.push(switched);
    }

    let member = sessions.pop().unwrap();
    let admin = sessions.pop().unwrap();
    (owner, admin, member)
}

fn user_id(session: &Value) -> &str {
    session["user"]["id"].as_str().expect("user id")
}

#[tokio::test]
async fn member_cannot_manage_other_members() {
    let app = spawn_app();
    let (_owner, admin, member) = seed_team(&app).await;

    let (status, _) = app
        .request(
            "PATCH",
            &format!("/team/members/{}", user_id(&admin)),
            Some(token(&member)),
            Some(json!({ "role": "viewer" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(
            "DELETE",
            &format!("/team/members/{}", user_id(&admin)),
            Some(token(&member)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_manages_members_within_their_delegation() {
    let app = spawn_app();
    let (owner, admin, member) = seed_team(&app).await;

    // Demoting an ordinary member is within an admin's rights
    let (status, _) = app
        .request(
            "PATCH",
            &format!("/team/members/{}", user_id(&member)),
            Some(token(&admin)),
            Some(json!({ "role": "viewer" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Promoting to admin takes an owner
    let (status, body) = app
        .request(
            "PATCH",
            &format!("/team/members/{}", user_id(&member)),
            Some(token(&admin)),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);

    // Touching the owner takes an owner
    let (status, _) = app
        .request(
            "PATCH",
            &format!("/team/members/{}", user_id(&owner)),
            Some(token(&admin)),
            Some(json!({ "role": "member" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn own_role_cannot_be_changed() {
    let app = spawn_app();
    let (owner, _admin, _member) = seed_team(&app).await;

    let (status, body) = app
        .request(
            "PATCH",
            &format!("/team/members/{}", user_id(&owner)),
            Some(token(&owner)),
            Some(json!({ "role": "member" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot change your own role");
}

#[tokio::test]
async fn the_last_owner_cannot_leave_or_be_removed() {
    let app = spawn_app();
    let (owner, admin, _member) = seed_team(&app).await;

    let (status, body) = app
        .request("POST", "/team/leave", Some(token(&owner)), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "A team must retain at least one owner");

    // With a second owner the original may leave
    let (status, _) = app
        .request(
            "PATCH",
            &format!("/team/members/{}", user_id(&admin)),
            Some(token(&owner)),
            Some(json!({ "role": "owner" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request("POST", "/team/leave", Some(token(&owner)), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, members) = app
        .request("GET", "/team/members", Some(token(&admin)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let members = members.as_array().unwrap();
    assert!(members.iter().all(|m| m["user_id"] != user_id(&owner)));
}

#[tokio::test]
async fn owner_removes_a_member() {
    let app = spawn_app();
    let (owner, _admin, member) = seed_team(&app).await;

    let (status, _) = app
        .request(
            "DELETE",
            &format!("/team/members/{}", user_id(&member)),
            Some(token(&owner)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The removed member's session no longer grants access to the team
    let (status, body) = app
        .request("GET", "/team/members", Some(token(&member)), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);
}
