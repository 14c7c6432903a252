//! Team model - the tenant isolation boundary, with embedded memberships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Team role, ordered by privilege. `Client` is a restricted external-party
/// role scoped to specific sub-resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Viewer,
    Member,
    Admin,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Viewer => "viewer",
            Role::Member => "member",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "client" => Ok(Role::Client),
            "viewer" => Ok(Role::Viewer),
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// A (team, user) pairing with a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: String,
    pub role: Role,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(user_id: String, role: Role) -> Self {
        Self {
            user_id,
            role,
            joined_at: Utc::now(),
        }
    }
}

/// A tenant. Exactly the users listed in `members` may act within it, and at
/// least one membership carries the owner role at all times (enforced by the
/// role-change operations, not by this struct).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub members: Vec<Membership>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Team {
    /// Create a team with its creator as the sole owner member.
    pub fn new(name: String, owner_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            owner_id: owner_id.clone(),
            members: vec![Membership::new(owner_id, Role::Owner)],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn member(&self, user_id: &str) -> Option<&Membership> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn role_of(&self, user_id: &str) -> Option<Role> {
        self.member(user_id).map(|m| m.role)
    }

    pub fn owner_count(&self) -> usize {
        self.members.iter().filter(|m| m.role == Role::Owner).count()
    }
}
