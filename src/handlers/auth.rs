//! Account endpoints: register, login, logout, team switch.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::error::AuthError;
use crate::middleware::AuthUser;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 100, message = "Team name must be 1-100 characters"))]
    pub team_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SwitchTeamRequest {
    #[validate(length(min = 1, message = "Team id is required"))]
    pub team_id: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    payload.validate()?;
    let session = state
        .auth
        .register(
            &payload.email,
            &payload.password,
            &payload.name,
            payload.team_name,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    payload.validate()?;
    let session = state.auth.login(&payload.email, &payload.password).await?;
    Ok(Json(session))
}

pub async fn logout(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<impl IntoResponse, AuthError> {
    state.auth.logout(&ctx).await?;
    Ok(Json(json!({ "message": "Logged out" })))
}

pub async fn switch_team(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Json(payload): Json<SwitchTeamRequest>,
) -> Result<impl IntoResponse, AuthError> {
    payload.validate()?;
    let session = state.auth.switch_team(&ctx, &payload.team_id).await?;
    Ok(Json(session))
}
