use async_trait::async_trait;
use chrono::Duration;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use super::EphemeralStore;
use crate::config::RedisConfig;
use crate::error::StoreError;
use crate::Result;

/// Redis-backed store shared by every service instance.
///
/// `set_if_absent` maps onto a single `SET key value NX PX ttl`, which Redis
/// executes atomically.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisStore {
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to coordination store");
        Ok(Self::new(conn, config.key_prefix.clone()))
    }

    pub fn new(conn: ConnectionManager, key_prefix: String) -> Self {
        Self { conn, key_prefix }
    }

    fn namespaced(&self, key: &str) -> String {
        namespaced_key(&self.key_prefix, key)
    }
}

fn namespaced_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", prefix, key)
    }
}

#[async_trait]
impl EphemeralStore for RedisStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let ttl_ms = ttl.num_milliseconds();
        if ttl_ms <= 0 {
            return Err(StoreError::InvalidTtl(ttl_ms).into());
        }

        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.namespaced(key))
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(self.namespaced(key)).await?;
        Ok(exists)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.namespaced(key)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{refresh_token_key, register_attempt_key};

    #[test]
    fn test_keys_are_namespaced_by_prefix() {
        assert_eq!(
            namespaced_key("blog", &register_attempt_key("Alice")),
            "blog:register_attempt:alice"
        );
        assert_eq!(namespaced_key("blog", "2fa_auth:7"), "blog:2fa_auth:7");
    }

    #[test]
    fn test_empty_prefix_leaves_keys_untouched() {
        assert_eq!(namespaced_key("", &refresh_token_key("abc")), "refresh_token:abc");
    }
}
