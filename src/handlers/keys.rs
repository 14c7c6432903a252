//! API key management endpoints, gated to team admins and owners.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use crate::error::AuthError;
use crate::middleware::AuthUser;
use crate::models::Role;
use crate::AppState;

const KEY_MANAGER_ROLES: &[Role] = &[Role::Admin, Role::Owner];

#[derive(Debug, Deserialize, Validate)]
pub struct CreateApiKeyRequest {
    #[validate(length(min = 1, max = 100, message = "Label must be 1-100 characters"))]
    pub label: String,
    #[validate(length(min = 1, message = "At least one scope is required"))]
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Json(payload): Json<CreateApiKeyRequest>,
) -> Result<impl IntoResponse, AuthError> {
    payload.validate()?;
    state.teams.require_role(&ctx, KEY_MANAGER_ROLES).await?;
    let created = state
        .keys
        .create(&ctx, &payload.label, payload.scopes, payload.expires_at)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<impl IntoResponse, AuthError> {
    state.teams.require_role(&ctx, KEY_MANAGER_ROLES).await?;
    let keys = state.keys.list(&ctx).await?;
    Ok(Json(keys))
}

pub async fn revoke(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(key_id): Path<String>,
) -> Result<impl IntoResponse, AuthError> {
    state.teams.require_role(&ctx, KEY_MANAGER_ROLES).await?;
    state.keys.revoke(&ctx, &key_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
