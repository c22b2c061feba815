use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use tracing::debug;

/// Redis client wrapper with a multiplexed, auto-reconnecting connection
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
}

impl RedisClient {
    /// Connects to Redis at the given URL (e.g. "redis://localhost:6379")
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid Redis URL")?;
        let manager = client
            .get_connection_manager()
            .await
            .context("failed to connect to Redis")?;

        Ok(Self { manager })
    }

    /// Pings Redis to verify connectivity
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection();
        redis::cmd("PING")
            .query_async::<()>(&mut conn)
            .await
            .context("Redis ping failed")?;
        debug!("redis connection successful");
        Ok(())
    }

    /// Returns a cloned connection handle; clones share the underlying
    /// multiplexed connection
    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}
