//! In-memory store used by tests, mirroring the MongoDB behavior including
//! the not-deleted convention on API key lookups.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::db::{CredentialStore, RateLimitStore};
use crate::models::{ApiKey, ApiKeySummary, Membership, RateLimitWindow, Role, Team, User};

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, User>>,
    teams: Mutex<HashMap<String, Team>>,
    api_keys: Mutex<HashMap<String, ApiKey>>,
    rate_windows: Mutex<Vec<RateLimitWindow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err(name: &str) -> anyhow::Error {
        anyhow::anyhow!("Memory store mutex poisoned: {}", name)
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        let users = self.users.lock().map_err(|_| Self::lock_err("users"))?;
        let email = email.to_lowercase();
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, anyhow::Error> {
        let users = self.users.lock().map_err(|_| Self::lock_err("users"))?;
        Ok(users.get(user_id).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), anyhow::Error> {
        let mut users = self.users.lock().map_err(|_| Self::lock_err("users"))?;
        if users.values().any(|u| u.email == user.email) {
            return Err(anyhow::anyhow!("duplicate key: email"));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_team(&self, team_id: &str) -> Result<Option<Team>, anyhow::Error> {
        let teams = self.teams.lock().map_err(|_| Self::lock_err("teams"))?;
        Ok(teams.get(team_id).cloned())
    }

    async fn find_teams_for_user(&self, user_id: &str) -> Result<Vec<Team>, anyhow::Error> {
        let teams = self.teams.lock().map_err(|_| Self::lock_err("teams"))?;
        let mut found: Vec<Team> = teams
            .values()
            .filter(|t| t.member(user_id).is_some())
            .cloned()
            .collect();
        found.sort_by_key(|t| t.created_at);
        Ok(found)
    }

    async fn insert_team(&self, team: &Team) -> Result<(), anyhow::Error> {
        let mut teams = self.teams.lock().map_err(|_| Self::lock_err("teams"))?;
        teams.insert(team.id.clone(), team.clone());
        Ok(())
    }

    async fn add_membership(
        &self,
        team_id: &str,
        membership: &Membership,
    ) -> Result<bool, anyhow::Error> {
        let mut teams = self.teams.lock().map_err(|_| Self::lock_err("teams"))?;
        if let Some(team) = teams.get_mut(team_id) {
            if team.member(&membership.user_id).is_some() {
                return Ok(false);
            }
            team.members.push(membership.clone());
            team.updated_at = Utc::now();
            return Ok(true);
        }
        Ok(false)
    }

    async fn update_membership_role(
        &self,
        team_id: &str,
        user_id: &str,
        role: Role,
    ) -> Result<bool, anyhow::Error> {
        let mut teams = self.teams.lock().map_err(|_| Self::lock_err("teams"))?;
        if let Some(team) = teams.get_mut(team_id) {
            if let Some(member) = team.members.iter_mut().find(|m| m.user_id == user_id) {
                member.role = role;
                team.updated_at = Utc::now();
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn remove_membership(
        &self,
        team_id: &str,
        user_id: &str,
    ) -> Result<bool, anyhow::Error> {
        let mut teams = self.teams.lock().map_err(|_| Self::lock_err("teams"))?;
        if let Some(team) = teams.get_mut(team_id) {
            let before = team.members.len();
            team.members.retain(|m| m.user_id != user_id);
            if team.members.len() < before {
                team.updated_at = Utc::now();
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn find_api_key_by_prefix(&self, prefix: &str) -> Result<Option<ApiKey>, anyhow::Error> {
        let keys = self.api_keys.lock().map_err(|_| Self::lock_err("api_keys"))?;
        Ok(keys
            .values()
            .find(|k| k.key_prefix == prefix && k.deleted_at.is_none())
            .cloned())
    }

    async fn insert_api_key(&self, key: &ApiKey) -> Result<(), anyhow::Error> {
        let mut keys = self.api_keys.lock().map_err(|_| Self::lock_err("api_keys"))?;
        keys.insert(key.id.clone(), key.clone());
        Ok(())
    }

    async fn list_api_keys(&self, team_id: &str) -> Result<Vec<ApiKeySummary>, anyhow::Error> {
        let keys = self.api_keys.lock().map_err(|_| Self::lock_err("api_keys"))?;
        Ok(keys
            .values()
            .filter(|k| k.team_id == team_id && k.deleted_at.is_none())
            .map(ApiKey::summary)
            .collect())
    }

    async fn soft_delete_api_key(
        &self,
        team_id: &str,
        key_id: &str,
    ) -> Result<bool, anyhow::Error> {
        let mut keys = self.api_keys.lock().map_err(|_| Self::lock_err("api_keys"))?;
        if let Some(key) = keys.get_mut(key_id) {
            if key.team_id == team_id && key.deleted_at.is_none() {
                key.deleted_at = Some(Utc::now());
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn touch_api_key(&self, key_id: &str) -> Result<(), anyhow::Error> {
        let mut keys = self.api_keys.lock().map_err(|_| Self::lock_err("api_keys"))?;
        if let Some(key) = keys.get_mut(key_id) {
            key.last_used_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn count_window(&self, key: &str, since: DateTime<Utc>) -> Result<u64, anyhow::Error> {
        let windows = self
            .rate_windows
            .lock()
            .map_err(|_| Self::lock_err("rate_windows"))?;
        Ok(windows
            .iter()
            .filter(|w| w.key == key && w.created_at >= since)
            .count() as u64)
    }

    async fn oldest_in_window(
        &self,
        key: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, anyhow::Error> {
        let windows = self
            .rate_windows
            .lock()
            .map_err(|_| Self::lock_err("rate_windows"))?;
        Ok(windows
            .iter()
            .filter(|w| w.key == key && w.created_at >= since)
            .map(|w| w.created_at)
            .min())
    }

    async fn insert_window_record(&self, record: &RateLimitWindow) -> Result<(), anyhow::Error> {
        let mut windows = self
            .rate_windows
            .lock()
            .map_err(|_| Self::lock_err("rate_windows"))?;
        windows.push(record.clone());
        Ok(())
    }
}
