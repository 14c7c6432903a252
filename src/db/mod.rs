//! Persistence layer: store traits plus the MongoDB and in-memory backends.
//!
//! Stores are explicitly constructed handles injected into the services that
//! need them; nothing in this crate keeps module-level connection state.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoDb;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{ApiKey, ApiKeySummary, Membership, RateLimitWindow, Role, Team, User};

/// Reads and writes for identities, teams and API key credentials.
///
/// API key lookups exclude soft-deleted records by convention; a revoked key
/// is indistinguishable from an unknown one.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn health_check(&self) -> Result<(), anyhow::Error>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error>;
    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, anyhow::Error>;
    async fn insert_user(&self, user: &User) -> Result<(), anyhow::Error>;

    async fn find_team(&self, team_id: &str) -> Result<Option<Team>, anyhow::Error>;
    async fn find_teams_for_user(&self, user_id: &str) -> Result<Vec<Team>, anyhow::Error>;
    async fn insert_team(&self, team: &Team) -> Result<(), anyhow::Error>;
    /// Add a membership unless the user already belongs to the team.
    /// Returns false when the team is missing or the user is a member.
    async fn add_membership(
        &self,
        team_id: &str,
        membership: &Membership,
    ) -> Result<bool, anyhow::Error>;
    async fn update_membership_role(
        &self,
        team_id: &str,
        user_id: &str,
        role: Role,
    ) -> Result<bool, anyhow::Error>;
    async fn remove_membership(&self, team_id: &str, user_id: &str)
        -> Result<bool, anyhow::Error>;

    async fn find_api_key_by_prefix(&self, prefix: &str) -> Result<Option<ApiKey>, anyhow::Error>;
    async fn insert_api_key(&self, key: &ApiKey) -> Result<(), anyhow::Error>;
    async fn list_api_keys(&self, team_id: &str) -> Result<Vec<ApiKeySummary>, anyhow::Error>;
    async fn soft_delete_api_key(&self, team_id: &str, key_id: &str)
        -> Result<bool, anyhow::Error>;
    /// Best-effort `last_used_at` bump; callers never fail a request on it.
    async fn touch_api_key(&self, key_id: &str) -> Result<(), anyhow::Error>;
}

/// Reads and writes for sliding-window rate limit records.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn count_window(&self, key: &str, since: DateTime<Utc>) -> Result<u64, anyhow::Error>;
    async fn oldest_in_window(
        &self,
        key: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, anyhow::Error>;
    async fn insert_window_record(&self, record: &RateLimitWindow) -> Result<(), anyhow::Error>;
}
