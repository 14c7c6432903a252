//! API key lifecycle: create, list, revoke.
//!
//! The full secret exists in memory only during creation and is returned to
//! the caller exactly once; everything persisted is the visible prefix plus
//! an Argon2 hash.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::db::CredentialStore;
use crate::error::AuthError;
use crate::models::{ApiKey, ApiKeySummary};
use crate::services::auth::AuthContext;
use crate::services::{api_key, scope};

/// Creation response. `key` is the only place the full secret ever appears.
#[derive(Debug, Serialize)]
pub struct CreatedApiKey {
    pub key: String,
    #[serde(flatten)]
    pub summary: ApiKeySummary,
}

#[derive(Clone)]
pub struct ApiKeyService {
    store: Arc<dyn CredentialStore>,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        ctx: &AuthContext,
        label: &str,
        scopes: Vec<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<CreatedApiKey, AuthError> {
        if let Some(invalid) = scopes.iter().find(|s| !scope::is_valid_scope(s)) {
            return Err(AuthError::BadRequest(format!(
                "Invalid scope: {}",
                invalid
            )));
        }
        if let Some(expiry) = expires_at {
            if expiry <= Utc::now() {
                return Err(AuthError::BadRequest(
                    "Expiry must be in the future".to_string(),
                ));
            }
        }

        let generated = api_key::generate();
        let hash = api_key::hash_key(&generated.secret).map_err(AuthError::Internal)?;

        let key = ApiKey::new(
            ctx.user_id.clone(),
            ctx.team_id.clone(),
            label.to_string(),
            generated.prefix,
            hash,
            scopes,
            expires_at,
        );
        self.store
            .insert_api_key(&key)
            .await
            .map_err(AuthError::Internal)?;

        tracing::info!(
            team_id = %ctx.team_id,
            key_prefix = %key.key_prefix,
            "API key created"
        );

        Ok(CreatedApiKey {
            key: generated.secret,
            summary: key.summary(),
        })
    }

    pub async fn list(&self, ctx: &AuthContext) -> Result<Vec<ApiKeySummary>, AuthError> {
        self.store
            .list_api_keys(&ctx.team_id)
            .await
            .map_err(AuthError::Internal)
    }

    /// Soft-delete a key; it stops authenticating immediately.
    pub async fn revoke(&self, ctx: &AuthContext, key_id: &str) -> Result<(), AuthError> {
        let deleted = self
            .store
            .soft_delete_api_key(&ctx.team_id, key_id)
            .await
            .map_err(AuthError::Internal)?;
        if !deleted {
            return Err(AuthError::NotFound("API key not found".to_string()));
        }
        tracing::info!(team_id = %ctx.team_id, key_id = %key_id, "API key revoked");
        Ok(())
    }
}
