//! Authenticator: the single entry point every resource handler composes
//! with, plus the account flows (register, login, logout, team switch).
//!
//! Session credentials are not subject to scope checks; team role gates the
//! privileged operations instead. That conflates "is logged in" with "may
//! write anything in this tenant" and is kept deliberately; revisit if
//! per-session scoping ever becomes a requirement.

use axum::http::{header, HeaderMap, Method};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::db::CredentialStore;
use crate::error::AuthError;
use crate::models::{SanitizedUser, Team, User};
use crate::services::jwt::{JwtService, TokenError, SHORT_SESSION_TTL_HOURS};
use crate::services::{api_key, scope};
use crate::utils::{hash_secret, verify_secret, Secret, SecretHash};

/// A bearer credential, classified by shape before any lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Credential {
    Session(String),
    ApiKey(String),
}

impl Credential {
    pub fn classify(bearer: &str) -> Self {
        if api_key::is_api_key(bearer) {
            Credential::ApiKey(bearer.to_string())
        } else {
            Credential::Session(bearer.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Session,
    ApiKey,
}

/// Uniform authorization context handed to every handler.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub team_id: String,
    /// Granted scope strings; empty for sessions, which are role-gated
    /// instead.
    pub granted_scopes: Vec<String>,
    /// Visible prefix of the authenticating key, for audit trails.
    pub key_prefix: Option<String>,
    pub credential: CredentialKind,
    /// The session's jti, when present, so logout and team-switch can
    /// revoke it.
    pub jti: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AuthOptions {
    /// Override the path-derived scopes, for endpoints whose required
    /// permission does not match their route (e.g. cross-resource search).
    pub required_scopes: Option<Vec<String>>,
    pub skip_scope_check: bool,
}

#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    jwt: JwtService,
}

impl Authenticator {
    pub fn new(store: Arc<dyn CredentialStore>, jwt: JwtService) -> Self {
        Self { store, jwt }
    }

    /// Authenticate a request from its authorization header, method and
    /// path. Returns a uniform context or a structured failure.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        method: &Method,
        path: &str,
        options: AuthOptions,
    ) -> Result<AuthContext, AuthError> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| {
                AuthError::unauthorized("Missing or invalid Authorization header")
            })?;

        match Credential::classify(bearer) {
            Credential::Session(token) => self.authenticate_session(&token).await,
            Credential::ApiKey(secret) => {
                self.authenticate_api_key(&secret, method, path, options)
                    .await
            }
        }
    }

    async fn authenticate_session(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = self.jwt.verify(token).await.map_err(|e| match e {
            TokenError::Expired => AuthError::unauthorized("Session expired"),
            TokenError::Revoked => AuthError::unauthorized("Session has been revoked"),
            TokenError::InvalidSignature | TokenError::Malformed => {
                AuthError::unauthorized("Invalid session token")
            }
            TokenError::Store(e) => AuthError::Internal(e),
        })?;

        Ok(AuthContext {
            user_id: claims.sub,
            team_id: claims.team_id,
            granted_scopes: Vec::new(),
            key_prefix: None,
            credential: CredentialKind::Session,
            jti: claims.jti,
        })
    }

    async fn authenticate_api_key(
        &self,
        secret: &str,
        method: &Method,
        path: &str,
        options: AuthOptions,
    ) -> Result<AuthContext, AuthError> {
        // Messages stay identical for unknown prefix and hash mismatch to
        // avoid a credential-guessing oracle.
        let prefix = api_key::visible_prefix(secret)
            .ok_or_else(|| AuthError::unauthorized("Invalid API key"))?;

        let key = self
            .store
            .find_api_key_by_prefix(prefix)
            .await
            .map_err(AuthError::Internal)?
            .ok_or_else(|| AuthError::unauthorized("Invalid API key"))?;

        if !api_key::verify_key(secret, &key.key_hash) {
            return Err(AuthError::unauthorized("Invalid API key"));
        }

        if key.is_expired(Utc::now()) {
            return Err(AuthError::unauthorized("API key expired"));
        }

        if !options.skip_scope_check {
            let required = match options.required_scopes {
                Some(required) => required,
                None => scope::resource_from_path(path)
                    .map(|resource| scope::derive_required_scopes(&resource, method))
                    .unwrap_or_default(),
            };

            if !scope::check_scopes(&key.scopes, &required) {
                tracing::warn!(
                    key_prefix = %key.key_prefix,
                    required = ?required,
                    granted = ?key.scopes,
                    "Insufficient scopes"
                );
                return Err(AuthError::forbidden(format!(
                    "Insufficient scope. Required: {}",
                    required.join(", ")
                )));
            }
        }

        // Best-effort last_used_at bump; never fails the request.
        let store = self.store.clone();
        let key_id = key.id.clone();
        tokio::spawn(async move {
            if let Err(e) = store.touch_api_key(&key_id).await {
                tracing::debug!(error = %e, key_id = %key_id, "Failed to update last_used_at");
            }
        });

        Ok(AuthContext {
            user_id: key.user_id,
            team_id: key.team_id,
            granted_scopes: key.scopes,
            key_prefix: Some(key.key_prefix),
            credential: CredentialKind::ApiKey,
            jti: None,
        })
    }
}

/// Session payload returned by register, login and switch-team.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub team_id: String,
    pub user: SanitizedUser,
}

/// Account flows: registration, login, logout, team switch.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, jwt: JwtService) -> Self {
        Self { store, jwt }
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        team_name: Option<String>,
    ) -> Result<SessionResponse, AuthError> {
        let normalized = email.trim().to_lowercase();

        if self
            .store
            .find_user_by_email(&normalized)
            .await
            .map_err(AuthError::Internal)?
            .is_some()
        {
            return Err(AuthError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_secret(&Secret::new(password.to_string()))
            .map_err(AuthError::Internal)?
            .into_string();

        let user = User::new(&normalized, password_hash, name.to_string());
        self.store
            .insert_user(&user)
            .await
            .map_err(AuthError::Internal)?;

        let team = Team::new(
            team_name.unwrap_or_else(|| format!("{}'s Team", name)),
            user.id.clone(),
        );
        self.store
            .insert_team(&team)
            .await
            .map_err(AuthError::Internal)?;

        tracing::info!(user_id = %user.id, team_id = %team.id, "User registered");

        let (token, _jti) = self
            .jwt
            .short_lived_token(
                &user.id,
                &team.id,
                Some(user.name.clone()),
                Some(user.email.clone()),
            )
            .map_err(AuthError::Internal)?;

        Ok(SessionResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: SHORT_SESSION_TTL_HOURS * 3600,
            team_id: team.id,
            user: user.sanitized(),
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionResponse, AuthError> {
        // One message for unknown email and wrong password
        let invalid = || AuthError::unauthorized("Invalid email or password");

        let user = self
            .store
            .find_user_by_email(email)
            .await
            .map_err(AuthError::Internal)?
            .ok_or_else(invalid)?;

        verify_secret(
            &Secret::new(password.to_string()),
            &SecretHash::new(user.password_hash.clone()),
        )
        .map_err(|_| invalid())?;

        let teams = self
            .store
            .find_teams_for_user(&user.id)
            .await
            .map_err(AuthError::Internal)?;
        let team = teams
            .first()
            .ok_or_else(|| AuthError::Internal(anyhow::anyhow!("User has no team membership")))?;

        let (token, _jti) = self
            .jwt
            .login_token(
                &user.id,
                &team.id,
                Some(user.name.clone()),
                Some(user.email.clone()),
            )
            .map_err(AuthError::Internal)?;

        tracing::info!(user_id = %user.id, team_id = %team.id, "User logged in");

        Ok(SessionResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.session_ttl().num_seconds(),
            team_id: team.id.clone(),
            user: user.sanitized(),
        })
    }

    /// Revoke the session's jti. Tokens without a jti have nothing to
    /// revoke; API keys are revoked through key management instead.
    pub async fn logout(&self, ctx: &AuthContext) -> Result<(), AuthError> {
        if ctx.credential == CredentialKind::ApiKey {
            return Err(AuthError::BadRequest(
                "API key credentials cannot be logged out".to_string(),
            ));
        }

        if let Some(jti) = &ctx.jti {
            self.jwt.revoke(jti).await.map_err(AuthError::Internal)?;
            tracing::info!(user_id = %ctx.user_id, "Session revoked");
        }

        Ok(())
    }

    /// Supersede the current session with a short-lived one for another
    /// team the caller belongs to.
    pub async fn switch_team(
        &self,
        ctx: &AuthContext,
        team_id: &str,
    ) -> Result<SessionResponse, AuthError> {
        if ctx.credential == CredentialKind::ApiKey {
            return Err(AuthError::forbidden("API keys are bound to a single team"));
        }

        // Same message for unknown team and non-membership
        let not_member = || AuthError::forbidden("Not a member of this team");

        let team = self
            .store
            .find_team(team_id)
            .await
            .map_err(AuthError::Internal)?
            .ok_or_else(not_member)?;
        if team.member(&ctx.user_id).is_none() {
            return Err(not_member());
        }

        let user = self
            .store
            .find_user_by_id(&ctx.user_id)
            .await
            .map_err(AuthError::Internal)?
            .ok_or_else(|| AuthError::unauthorized("Invalid session"))?;

        // The old session must not outlive the switch.
        if let Some(jti) = &ctx.jti {
            self.jwt.revoke(jti).await.map_err(AuthError::Internal)?;
        }

        let (token, _jti) = self
            .jwt
            .short_lived_token(
                &user.id,
                &team.id,
                Some(user.name.clone()),
                Some(user.email.clone()),
            )
            .map_err(AuthError::Internal)?;

        tracing::info!(user_id = %user.id, team_id = %team.id, "Team switched");

        Ok(SessionResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: SHORT_SESSION_TTL_HOURS * 3600,
            team_id: team.id,
            user: user.sanitized(),
        })
    }
}
