use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::EphemeralStore;
use crate::error::StoreError;
use crate::Result;

#[derive(Debug)]
struct Entry {
    #[allow(dead_code)]
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Single-process store. Only correct when exactly one service instance runs;
/// multi-instance deployments need [`super::RedisStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry. Expired entries are already invisible to
    /// readers; this only reclaims memory.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

fn ttl_to_std(ttl: Duration) -> Result<std::time::Duration> {
    ttl.to_std()
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or_else(|| StoreError::InvalidTtl(ttl.num_milliseconds()).into())
}

#[async_trait]
impl EphemeralStore for MemoryStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let ttl = ttl_to_std(ttl)?;
        let now = Instant::now();

        // Check and insert under one lock acquisition.
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        Ok(entries.get(key).is_some_and(|entry| entry.is_live(now)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppError;

    #[tokio::test]
    async fn test_set_if_absent_only_first_wins() {
        let store = MemoryStore::new();
        let ttl = Duration::minutes(1);

        assert!(store.set_if_absent("k", "1", ttl).await.unwrap());
        assert!(!store.set_if_absent("k", "2", ttl).await.unwrap());
        assert!(store.exists("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = MemoryStore::new();
        assert!(store.set_if_absent("k", "1", Duration::seconds(5)).await.unwrap());

        tokio::time::advance(std::time::Duration::from_secs(6)).await;

        assert!(!store.exists("k").await.unwrap());
        // An expired key can be claimed again.
        assert!(store.set_if_absent("k", "1", Duration::seconds(5)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store.set_if_absent("short", "1", Duration::seconds(1)).await.unwrap();
        store.set_if_absent("long", "1", Duration::hours(1)).await.unwrap();

        tokio::time::advance(std::time::Duration::from_secs(2)).await;

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.exists("long").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        store.set_if_absent("k", "1", Duration::minutes(1)).await.unwrap();
        store.delete("k").await.unwrap();
        assert!(!store.exists("k").await.unwrap());
        // Deleting a missing key is not an error.
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_non_positive_ttl() {
        let store = MemoryStore::new();
        let err = store.set_if_absent("k", "1", Duration::zero()).await.unwrap_err();
        assert!(matches!(err, AppError::StoreError(StoreError::InvalidTtl(0))));
        let err = store.set_if_absent("k", "1", Duration::seconds(-3)).await.unwrap_err();
        assert!(matches!(err, AppError::StoreError(StoreError::InvalidTtl(_))));
    }

    #[tokio::test]
    async fn test_concurrent_set_if_absent_has_single_winner() {
        let store = MemoryStore::new();
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .set_if_absent("lock", &i.to_string(), Duration::minutes(1))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
