//! Revocation markers for session tokens, keyed by `jti`.
//!
//! Markers carry their own TTL so the backing store garbage-collects them
//! once the revoked token would have expired anyway.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};

#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Mark a jti as revoked. Idempotent.
    async fn revoke(&self, jti: &str, ttl_seconds: i64) -> Result<(), anyhow::Error>;
    async fn is_revoked(&self, jti: &str) -> Result<bool, anyhow::Error>;
    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisRevocationStore {
    manager: ConnectionManager,
}

impl RedisRevocationStore {
    pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        tracing::info!(url = %url, "Connecting to Redis");
        let client = Client::open(url)?;

        // ConnectionManager reconnects automatically
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");
        Ok(Self { manager })
    }

    fn key(jti: &str) -> String {
        format!("revoked:{}", jti)
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn revoke(&self, jti: &str, ttl_seconds: i64) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(Self::key(jti))
            .arg("revoked")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to store revocation marker: {}", e))
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let exists: bool = redis::cmd("EXISTS")
            .arg(Self::key(jti))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to check revocation marker: {}", e))?;
        Ok(exists)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

/// In-memory revocation store for tests.
#[derive(Default)]
pub struct MemoryRevocationStore {
    revoked: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, jti: &str, _ttl_seconds: i64) -> Result<(), anyhow::Error> {
        self.revoked
            .lock()
            .map_err(|e| anyhow::anyhow!("Revocation mutex poisoned: {}", e))?
            .insert(jti.to_string());
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, anyhow::Error> {
        let contains = self
            .revoked
            .lock()
            .map_err(|e| anyhow::anyhow!("Revocation mutex poisoned: {}", e))?
            .contains(jti);
        Ok(contains)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
