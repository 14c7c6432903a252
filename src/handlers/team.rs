//! Team membership endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::error::AuthError;
use crate::middleware::AuthUser;
use crate::models::Role;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

pub async fn list_members(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<impl IntoResponse, AuthError> {
    let members = state.teams.list_members(&ctx).await?;
    Ok(Json(members))
}

pub async fn add_member(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Json(payload): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, AuthError> {
    payload.validate()?;
    state
        .teams
        .add_member(&ctx, &payload.email, payload.role)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "message": "Member added" }))))
}

pub async fn change_member_role(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(user_id): Path<String>,
    Json(payload): Json<ChangeRoleRequest>,
) -> Result<impl IntoResponse, AuthError> {
    state
        .teams
        .change_member_role(&ctx, &user_id, payload.role)
        .await?;
    Ok(Json(json!({ "message": "Role updated" })))
}

pub async fn remove_member(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AuthError> {
    state.teams.remove_member(&ctx, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn leave(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<impl IntoResponse, AuthError> {
    state.teams.leave(&ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}
