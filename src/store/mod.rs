//! Ephemeral coordination store.
//!
//! A shared key-value store with per-key TTL and an atomic set-if-absent
//! primitive. The auth core uses it as a distributed mutex for registration,
//! a marker for pending 2FA logins, and a ledger of consumed refresh tokens.

mod keys;
mod memory;
mod redis_store;

use async_trait::async_trait;
use chrono::Duration;

use crate::Result;

pub use keys::{refresh_token_key, register_attempt_key, two_factor_challenge_key};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

#[async_trait]
pub trait EphemeralStore: Send + Sync {
    /// Writes `key` only if it does not exist yet. Returns whether the write happened.
    ///
    /// Implementations must perform the check and the write as one atomic step,
    /// visible to every service instance sharing the store.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn delete(&self, key: &str) -> Result<()>;
}
