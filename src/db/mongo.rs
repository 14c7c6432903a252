//! MongoDB-backed store implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{FindOneOptions, IndexOptions},
    Client, Collection, Database, IndexModel,
};
use std::time::Duration as StdDuration;

use crate::db::{CredentialStore, RateLimitStore};
use crate::models::{ApiKey, ApiKeySummary, Membership, RateLimitWindow, Role, Team, User};

#[derive(Clone)]
pub struct MongoDb {
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, mongodb::error::Error> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);
        tracing::info!("Successfully connected to MongoDB");
        Ok(Self { db })
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    pub fn teams(&self) -> Collection<Team> {
        self.db.collection("teams")
    }

    pub fn api_keys(&self) -> Collection<ApiKey> {
        self.db.collection("api_keys")
    }

    pub fn rate_limits(&self) -> Collection<RateLimitWindow> {
        self.db.collection("rate_limits")
    }

    /// Create the indexes the auth core relies on. Idempotent.
    pub async fn initialize_indexes(&self) -> Result<(), mongodb::error::Error> {
        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                None,
            )
            .await?;

        self.teams()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "members.user_id": 1 })
                    .build(),
                None,
            )
            .await?;

        self.api_keys()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "key_prefix": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                None,
            )
            .await?;

        self.rate_limits()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "key": 1, "created_at": 1 })
                    .build(),
                None,
            )
            .await?;

        // TTL index: storage garbage-collects window records once expired.
        self.rate_limits()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "expires_at": 1 })
                    .options(
                        IndexOptions::builder()
                            .expire_after(StdDuration::from_secs(0))
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        tracing::info!("MongoDB indexes initialized");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MongoDb {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| anyhow::anyhow!("MongoDB health check failed: {}", e))?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        let user = self
            .users()
            .find_one(doc! { "email": email.to_lowercase() }, None)
            .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, anyhow::Error> {
        let user = self.users().find_one(doc! { "_id": user_id }, None).await?;
        Ok(user)
    }

    async fn insert_user(&self, user: &User) -> Result<(), anyhow::Error> {
        self.users().insert_one(user, None).await?;
        Ok(())
    }

    async fn find_team(&self, team_id: &str) -> Result<Option<Team>, anyhow::Error> {
        let team = self.teams().find_one(doc! { "_id": team_id }, None).await?;
        Ok(team)
    }

    async fn find_teams_for_user(&self, user_id: &str) -> Result<Vec<Team>, anyhow::Error> {
        let cursor = self
            .teams()
            .find(doc! { "members.user_id": user_id }, None)
            .await?;
        let teams = cursor.try_collect().await?;
        Ok(teams)
    }

    async fn insert_team(&self, team: &Team) -> Result<(), anyhow::Error> {
        self.teams().insert_one(team, None).await?;
        Ok(())
    }

    async fn add_membership(
        &self,
        team_id: &str,
        membership: &Membership,
    ) -> Result<bool, anyhow::Error> {
        let result = self
            .teams()
            .update_one(
                doc! { "_id": team_id, "members.user_id": { "$ne": &membership.user_id } },
                doc! {
                    "$push": { "members": mongodb::bson::to_bson(membership)? },
                    "$set": { "updated_at": mongodb::bson::DateTime::from_chrono(Utc::now()) },
                },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn update_membership_role(
        &self,
        team_id: &str,
        user_id: &str,
        role: Role,
    ) -> Result<bool, anyhow::Error> {
        let result = self
            .teams()
            .update_one(
                doc! { "_id": team_id, "members.user_id": user_id },
                doc! { "$set": {
                    "members.$.role": role.as_str(),
                    "updated_at": mongodb::bson::DateTime::from_chrono(Utc::now()),
                } },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn remove_membership(
        &self,
        team_id: &str,
        user_id: &str,
    ) -> Result<bool, anyhow::Error> {
        let result = self
            .teams()
            .update_one(
                doc! { "_id": team_id },
                doc! {
                    "$pull": { "members": { "user_id": user_id } },
                    "$set": { "updated_at": mongodb::bson::DateTime::from_chrono(Utc::now()) },
                },
                None,
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn find_api_key_by_prefix(&self, prefix: &str) -> Result<Option<ApiKey>, anyhow::Error> {
        // Soft-deleted keys are treated as not found.
        let key = self
            .api_keys()
            .find_one(doc! { "key_prefix": prefix, "deleted_at": null }, None)
            .await?;
        Ok(key)
    }

    async fn insert_api_key(&self, key: &ApiKey) -> Result<(), anyhow::Error> {
        self.api_keys().insert_one(key, None).await?;
        Ok(())
    }

    async fn list_api_keys(&self, team_id: &str) -> Result<Vec<ApiKeySummary>, anyhow::Error> {
        let cursor = self
            .api_keys()
            .find(doc! { "team_id": team_id, "deleted_at": null }, None)
            .await?;
        let keys: Vec<ApiKey> = cursor.try_collect().await?;
        Ok(keys.iter().map(ApiKey::summary).collect())
    }

    async fn soft_delete_api_key(
        &self,
        team_id: &str,
        key_id: &str,
    ) -> Result<bool, anyhow::Error> {
        let result = self
            .api_keys()
            .update_one(
                doc! { "_id": key_id, "team_id": team_id, "deleted_at": null },
                doc! { "$set": {
                    "deleted_at": mongodb::bson::DateTime::from_chrono(Utc::now()),
                } },
                None,
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn touch_api_key(&self, key_id: &str) -> Result<(), anyhow::Error> {
        self.api_keys()
            .update_one(
                doc! { "_id": key_id },
                doc! { "$set": {
                    "last_used_at": mongodb::bson::DateTime::from_chrono(Utc::now()),
                } },
                None,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RateLimitStore for MongoDb {
    async fn count_window(&self, key: &str, since: DateTime<Utc>) -> Result<u64, anyhow::Error> {
        let count = self
            .rate_limits()
            .count_documents(
                doc! {
                    "key": key,
                    "created_at": { "$gte": mongodb::bson::DateTime::from_chrono(since) },
                },
                None,
            )
            .await?;
        Ok(count)
    }

    async fn oldest_in_window(
        &self,
        key: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, anyhow::Error> {
        let oldest = self
            .rate_limits()
            .find_one(
                doc! {
                    "key": key,
                    "created_at": { "$gte": mongodb::bson::DateTime::from_chrono(since) },
                },
                FindOneOptions::builder()
                    .sort(doc! { "created_at": 1 })
                    .build(),
            )
            .await?;
        Ok(oldest.map(|rec| rec.created_at))
    }

    async fn insert_window_record(&self, record: &RateLimitWindow) -> Result<(), anyhow::Error> {
        self.rate_limits().insert_one(record, None).await?;
        Ok(())
    }
}
