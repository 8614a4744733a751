use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{cmd, Client, RedisError, Script};
use tokio::sync::RwLock;

/// Fixed-window counter: the first hit in a window sets the expiry.
const FIXED_WINDOW_SCRIPT: &str = r#"
    local current = redis.call("INCR", KEYS[1])
    if current == 1 then
        redis.call("EXPIRE", KEYS[1], ARGV[1])
    end
    return current
"#;

/// Lazily connected Redis handle. Every operation degrades gracefully while disconnected.
#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone)]
pub(crate) enum RedisHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let client = Client::open(self.url.clone())?;
        let manager = ConnectionManager::new(client).await?;
        *self.manager.write().await = Some(manager);
        Ok(())
    }

    /// Connects, logging instead of failing; the service runs without Redis.
    pub(crate) async fn connect_or_warn(&self) {
        match self.connect().await {
            Ok(()) => tracing::info!("Redis connected successfully"),
            Err(err) => {
                tracing::error!(error = %err, "Failed to connect to Redis; rate limiting disabled")
            }
        }
    }

    pub(crate) async fn disconnect(&self) {
        *self.manager.write().await = None;
    }

    async fn manager(&self) -> Option<ConnectionManager> {
        self.manager.read().await.clone()
    }

    pub(crate) async fn health(&self) -> RedisHealth {
        let Some(mut manager) = self.manager().await else {
            return RedisHealth::Disconnected;
        };

        match cmd("PING").query_async::<_, String>(&mut manager).await {
            Ok(_) => RedisHealth::Healthy,
            Err(err) => RedisHealth::Unhealthy(err.to_string()),
        }
    }

    /// `true` while the key stays within `limit` hits per window. Always `true` without Redis.
    pub(crate) async fn rate_limit(
        &self,
        key: &str,
        limit: u64,
        window_seconds: u64,
    ) -> Result<bool, RedisError> {
        let Some(mut manager) = self.manager().await else {
            return Ok(true);
        };

        let current: i64 = Script::new(FIXED_WINDOW_SCRIPT)
            .key(key)
            .arg(window_seconds as i64)
            .invoke_async(&mut manager)
            .await?;

        Ok(current <= limit as i64)
    }
}
