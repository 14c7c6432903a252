//! Rate limit window records - one row per accepted request.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One accepted request within a sliding window, keyed by
/// `<category>:<identityOrIp>`. `expires_at` drives both window counting and
/// storage-side garbage collection (TTL index).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitWindow {
    #[serde(rename = "_id")]
    pub id: String,
    pub key: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl RateLimitWindow {
    pub fn new(key: String, window: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            key,
            created_at: now,
            expires_at: now + window,
        }
    }
}
