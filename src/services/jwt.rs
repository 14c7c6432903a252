//! Session token codec: HS256-signed claims with optional revocable jti.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::services::revocation::RevocationStore;

/// TTL for tokens minted by the register, invitation-acceptance and
/// team-switch flows. All three flows share this constant.
pub const SHORT_SESSION_TTL_HOURS: i64 = 12;

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Tenant the session acts within.
    pub team_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// JWT ID; presence makes the token revocable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("malformed token payload")]
    Malformed,
    #[error("token has been revoked")]
    Revoked,
    /// Revocation store unreachable. Verification fails closed; the
    /// authenticator surfaces this as a 500.
    #[error("revocation store error: {0}")]
    Store(#[source] anyhow::Error),
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_ttl: Duration,
    revocation: Arc<dyn RevocationStore>,
}

impl JwtService {
    /// Create the codec from config. An empty signing secret is a deployment
    /// misconfiguration and is rejected here, before any request is served.
    pub fn new(
        config: &JwtConfig,
        revocation: Arc<dyn RevocationStore>,
    ) -> Result<Self, anyhow::Error> {
        if config.secret.is_empty() {
            return Err(anyhow::anyhow!("JWT signing secret is not configured"));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            session_ttl: Duration::days(config.session_ttl_days),
            revocation,
        })
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Sign a session token. Identity and tenant ids are mandatory by
    /// construction; callers choose the TTL and whether the token carries a
    /// revocable jti.
    pub fn sign(
        &self,
        user_id: &str,
        team_id: &str,
        name: Option<String>,
        email: Option<String>,
        ttl: Duration,
        jti: Option<String>,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            team_id: team_id.to_string(),
            name,
            email,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode session token: {}", e))
    }

    /// Full-length session for an interactive login.
    pub fn login_token(
        &self,
        user_id: &str,
        team_id: &str,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<(String, String), anyhow::Error> {
        let jti = Uuid::new_v4().to_string();
        let token = self.sign(
            user_id,
            team_id,
            name,
            email,
            self.session_ttl,
            Some(jti.clone()),
        )?;
        Ok((token, jti))
    }

    /// Short-lived session minted by the register, invite and team-switch
    /// flows.
    pub fn short_lived_token(
        &self,
        user_id: &str,
        team_id: &str,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<(String, String), anyhow::Error> {
        let jti = Uuid::new_v4().to_string();
        let token = self.sign(
            user_id,
            team_id,
            name,
            email,
            Duration::hours(SHORT_SESSION_TTL_HOURS),
            Some(jti.clone()),
        )?;
        Ok((token, jti))
    }

    /// Verify a session token: signature, expiry, structural completeness,
    /// and (for tokens carrying a jti) the revocation store.
    pub async fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let validation = Validation::new(Algorithm::HS256);

        let data =
            decode::<SessionClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        TokenError::InvalidSignature
                    }
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed,
                }
            })?;

        let claims = data.claims;
        if claims.sub.is_empty() || claims.team_id.is_empty() {
            return Err(TokenError::Malformed);
        }

        if let Some(jti) = &claims.jti {
            let revoked = self
                .revocation
                .is_revoked(jti)
                .await
                .map_err(TokenError::Store)?;
            if revoked {
                return Err(TokenError::Revoked);
            }
        }

        Ok(claims)
    }

    /// Revoke a jti. The marker's TTL covers the maximum residual lifetime
    /// any token carrying this jti could still have.
    pub async fn revoke(&self, jti: &str) -> Result<(), anyhow::Error> {
        self.revocation
            .revoke(jti, self.session_ttl.num_seconds())
            .await
    }
}
