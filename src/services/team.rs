//! Team membership management and the role gate.
//!
//! Every mutation here enforces the same pair of invariants: a team never
//! loses its last owner, and an actor never grants a privilege level above
//! what an owner delegated to them.

use serde::Serialize;
use std::sync::Arc;

use crate::db::CredentialStore;
use crate::error::AuthError;
use crate::models::{Membership, Role, Team};
use crate::services::auth::AuthContext;

/// Membership joined with the user's display fields.
#[derive(Debug, Serialize)]
pub struct MemberView {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone)]
pub struct TeamService {
    store: Arc<dyn CredentialStore>,
}

impl TeamService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    async fn team(&self, team_id: &str) -> Result<Team, AuthError> {
        self.store
            .find_team(team_id)
            .await
            .map_err(AuthError::Internal)?
            .ok_or_else(|| AuthError::NotFound("Team not found".to_string()))
    }

    /// Require the caller to hold one of `allowed` roles in their current
    /// team. Returns the caller's role for further checks.
    pub async fn require_role(
        &self,
        ctx: &AuthContext,
        allowed: &[Role],
    ) -> Result<Role, AuthError> {
        let team = self.team(&ctx.team_id).await?;
        let role = team
            .role_of(&ctx.user_id)
            .ok_or_else(|| AuthError::forbidden("Not a member of this team"))?;
        if !allowed.contains(&role) {
            return Err(AuthError::forbidden(format!(
                "Requires one of roles: {}",
                allowed
                    .iter()
                    .map(Role::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Ok(role)
    }

    pub async fn list_members(&self, ctx: &AuthContext) -> Result<Vec<MemberView>, AuthError> {
        let team = self.team(&ctx.team_id).await?;
        if team.member(&ctx.user_id).is_none() {
            return Err(AuthError::forbidden("Not a member of this team"));
        }

        let mut views = Vec::with_capacity(team.members.len());
        for membership in &team.members {
            let user = self
                .store
                .find_user_by_id(&membership.user_id)
                .await
                .map_err(AuthError::Internal)?;
            // Memberships of since-deleted accounts are skipped rather
            // than surfaced as errors.
            if let Some(user) = user {
                views.push(MemberView {
                    user_id: user.id,
                    name: user.name,
                    email: user.email,
                    role: membership.role,
                    joined_at: membership.joined_at,
                });
            }
        }
        Ok(views)
    }

    /// Add an existing user to the caller's team.
    pub async fn add_member(
        &self,
        ctx: &AuthContext,
        email: &str,
        role: Role,
    ) -> Result<(), AuthError> {
        let actor = self
            .require_role(ctx, &[Role::Admin, Role::Owner])
            .await?;

        // Owner is never assignable here, and admin grants take an owner.
        if role == Role::Owner {
            return Err(AuthError::forbidden("Cannot add a member as owner"));
        }
        if role == Role::Admin && actor != Role::Owner {
            return Err(AuthError::forbidden("Only an owner can grant the admin role"));
        }

        let user = self
            .store
            .find_user_by_email(email)
            .await
            .map_err(AuthError::Internal)?
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;

        let added = self
            .store
            .add_membership(&ctx.team_id, &Membership::new(user.id.clone(), role))
            .await
            .map_err(AuthError::Internal)?;
        if !added {
            return Err(AuthError::Conflict(
                "User is already a member of this team".to_string(),
            ));
        }

        tracing::info!(team_id = %ctx.team_id, user_id = %user.id, role = %role, "Member added");
        Ok(())
    }

    pub async fn change_member_role(
        &self,
        ctx: &AuthContext,
        target_user_id: &str,
        new_role: Role,
    ) -> Result<(), AuthError> {
        let team = self.team(&ctx.team_id).await?;
        let actor = team
            .role_of(&ctx.user_id)
            .ok_or_else(|| AuthError::forbidden("Not a member of this team"))?;
        if actor < Role::Admin {
            return Err(AuthError::forbidden("Requires the admin or owner role"));
        }

        if target_user_id == ctx.user_id {
            return Err(AuthError::BadRequest(
                "Cannot change your own role".to_string(),
            ));
        }

        let current = team
            .role_of(target_user_id)
            .ok_or_else(|| AuthError::NotFound("Member not found".to_string()))?;

        // Only an owner touches admin-or-above, in either direction.
        if (new_role >= Role::Admin || current >= Role::Admin) && actor != Role::Owner {
            return Err(AuthError::forbidden(
                "Only an owner can assign or modify admin and owner roles",
            ));
        }

        if current == Role::Owner && new_role != Role::Owner && team.owner_count() <= 1 {
            return Err(AuthError::Conflict(
                "A team must retain at least one owner".to_string(),
            ));
        }

        let updated = self
            .store
            .update_membership_role(&ctx.team_id, target_user_id, new_role)
            .await
            .map_err(AuthError::Internal)?;
        if !updated {
            return Err(AuthError::NotFound("Member not found".to_string()));
        }

        tracing::info!(
            team_id = %ctx.team_id,
            user_id = %target_user_id,
            role = %new_role,
            "Member role changed"
        );
        Ok(())
    }

    pub async fn remove_member(
        &self,
        ctx: &AuthContext,
        target_user_id: &str,
    ) -> Result<(), AuthError> {
        let team = self.team(&ctx.team_id).await?;
        let actor = team
            .role_of(&ctx.user_id)
            .ok_or_else(|| AuthError::forbidden("Not a member of this team"))?;
        if actor < Role::Admin {
            return Err(AuthError::forbidden("Requires the admin or owner role"));
        }

        if target_user_id == ctx.user_id {
            return Err(AuthError::BadRequest(
                "Use leave to remove yourself".to_string(),
            ));
        }

        let current = team
            .role_of(target_user_id)
            .ok_or_else(|| AuthError::NotFound("Member not found".to_string()))?;

        if current >= Role::Admin && actor != Role::Owner {
            return Err(AuthError::forbidden(
                "Only an owner can remove an admin or owner",
            ));
        }
        if current == Role::Owner && team.owner_count() <= 1 {
            return Err(AuthError::Conflict(
                "A team must retain at least one owner".to_string(),
            ));
        }

        let removed = self
            .store
            .remove_membership(&ctx.team_id, target_user_id)
            .await
            .map_err(AuthError::Internal)?;
        if !removed {
            return Err(AuthError::NotFound("Member not found".to_string()));
        }

        tracing::info!(team_id = %ctx.team_id, user_id = %target_user_id, "Member removed");
        Ok(())
    }

    /// Remove the caller from their current team.
    pub async fn leave(&self, ctx: &AuthContext) -> Result<(), AuthError> {
        let team = self.team(&ctx.team_id).await?;
        let role = team
            .role_of(&ctx.user_id)
            .ok_or_else(|| AuthError::forbidden("Not a member of this team"))?;

        if role == Role::Owner && team.owner_count() <= 1 {
            return Err(AuthError::Conflict(
                "A team must retain at least one owner".to_string(),
            ));
        }

        self.store
            .remove_membership(&ctx.team_id, &ctx.user_id)
            .await
            .map_err(AuthError::Internal)?;

        tracing::info!(team_id = %ctx.team_id, user_id = %ctx.user_id, "Member left team");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{Team, User};
    use crate::services::auth::CredentialKind;

    fn ctx(user_id: &str, team_id: &str) -> AuthContext {
        AuthContext {
            user_id: user_id.to_string(),
            team_id: team_id.to_string(),
            granted_scopes: Vec::new(),
            key_prefix: None,
            credential: CredentialKind::Session,
            jti: None,
        }
    }

    async fn seed() -> (Arc<MemoryStore>, TeamService, Team) {
        let store = Arc::new(MemoryStore::new());
        for (id, email) in [
            ("owner-1", "owner@example.com"),
            ("admin-1", "admin@example.com"),
            ("member-1", "member@example.com"),
            ("outsider-1", "outsider@example.com"),
        ] {
            let mut user = User::new(email, "hash".to_string(), id.to_string());
            user.id = id.to_string();
            store.insert_user(&user).await.unwrap();
        }

        let mut team = Team::new("Acme".to_string(), "owner-1".to_string());
        team.members
            .push(Membership::new("admin-1".to_string(), Role::Admin));
        team.members
            .push(Membership::new("member-1".to_string(), Role::Member));
        store.insert_team(&team).await.unwrap();

        let svc = TeamService::new(store.clone());
        (store, svc, team)
    }

    #[tokio::test]
    async fn test_require_role() {
        let (_store, svc, team) = seed().await;

        svc.require_role(&ctx("owner-1", &team.id), &[Role::Admin, Role::Owner])
            .await
            .unwrap();
        let err = svc
            .require_role(&ctx("member-1", &team.id), &[Role::Admin, Role::Owner])
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));
        let err = svc
            .require_role(&ctx("outsider-1", &team.id), &[Role::Member])
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_self_role_change_is_rejected() {
        let (_store, svc, team) = seed().await;
        let err = svc
            .change_member_role(&ctx("owner-1", &team.id), "owner-1", Role::Member)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_admin_cannot_promote_to_admin_or_touch_owner() {
        let (_store, svc, team) = seed().await;
        let admin = ctx("admin-1", &team.id);

        let err = svc
            .change_member_role(&admin, "member-1", Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));

        let err = svc
            .change_member_role(&admin, "owner-1", Role::Member)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));

        let err = svc.remove_member(&admin, "owner-1").await.unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));

        // Within their delegation, admins manage ordinary members
        svc.change_member_role(&admin, "member-1", Role::Viewer)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_last_owner_is_protected() {
        let (store, svc, team) = seed().await;
        let owner = ctx("owner-1", &team.id);

        let err = svc.leave(&owner).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));

        // With a second owner, demotion and leaving become legal
        svc.change_member_role(&owner, "admin-1", Role::Owner)
            .await
            .unwrap();
        svc.leave(&owner).await.unwrap();

        let team = store.find_team(&team.id).await.unwrap().unwrap();
        assert!(team.role_of("owner-1").is_none());
        assert_eq!(team.owner_count(), 1);
    }

    #[tokio::test]
    async fn test_add_member() {
        let (_store, svc, team) = seed().await;
        let owner = ctx("owner-1", &team.id);

        svc.add_member(&owner, "outsider@example.com", Role::Member)
            .await
            .unwrap();
        let err = svc
            .add_member(&owner, "outsider@example.com", Role::Member)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));

        // Admin may add members but not grant admin
        let admin = ctx("admin-1", &team.id);
        let err = svc
            .add_member(&admin, "outsider@example.com", Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_list_members_requires_membership() {
        let (_store, svc, team) = seed().await;
        let members = svc.list_members(&ctx("member-1", &team.id)).await.unwrap();
        assert_eq!(members.len(), 3);

        let err = svc
            .list_members(&ctx("outsider-1", &team.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));
    }
}
