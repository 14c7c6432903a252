//! User model - registered identities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user. Emails are stored lowercase-normalized and are unique
/// across the deployment. Users are never hard-deleted here; leaving a team
/// is a membership concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub email_verified: bool,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: &str, password_hash: String, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.trim().to_lowercase(),
            password_hash,
            name,
            email_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Convert to a response shape without sensitive fields.
    pub fn sanitized(&self) -> SanitizedUser {
        SanitizedUser {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            email_verified: self.email_verified,
            created_at: self.created_at,
        }
    }
}

/// User representation safe to return to API callers.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}
