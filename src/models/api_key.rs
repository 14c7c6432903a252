//! API key credential model.
//!
//! The full secret is returned to the caller exactly once, at creation time.
//! Only its Argon2 hash and a short visible prefix persist. Revocation is a
//! soft delete; the record stays for audit purposes but is excluded from
//! every lookup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::optional_chrono_datetime_as_bson_datetime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub team_id: String,
    pub label: String,
    /// Visible lookup prefix (tag + leading secret characters), unique.
    pub key_prefix: String,
    /// Argon2 hash of the full secret. The secret itself is never stored.
    pub key_hash: String,
    pub scopes: Vec<String>,
    #[serde(
        default,
        with = "optional_chrono_datetime_as_bson_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "optional_chrono_datetime_as_bson_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_used_at: Option<DateTime<Utc>>,
    /// Soft-delete marker; a set value means the key is revoked.
    #[serde(
        default,
        with = "optional_chrono_datetime_as_bson_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    pub fn new(
        user_id: String,
        team_id: String,
        label: String,
        key_prefix: String,
        key_hash: String,
        scopes: Vec<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            team_id,
            label,
            key_prefix,
            key_hash,
            scopes,
            expires_at,
            created_at: Utc::now(),
            last_used_at: None,
            deleted_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp < now).unwrap_or(false)
    }

    /// Listing shape: prefix and metadata only, never the hash.
    pub fn summary(&self) -> ApiKeySummary {
        ApiKeySummary {
            id: self.id.clone(),
            label: self.label.clone(),
            key_prefix: self.key_prefix.clone(),
            scopes: self.scopes.clone(),
            expires_at: self.expires_at,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiKeySummary {
    pub id: String,
    pub label: String,
    pub key_prefix: String,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}
