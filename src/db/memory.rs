use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::models::{NewUser, User, UserChanges};
use crate::db::operations::UserRepository;
use crate::error::{AppError, DatabaseError};
use crate::Result;

#[derive(Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, User>,
}

/// In-process credential store with the same case-insensitive uniqueness
/// rule as the `users_username_lower_idx` index.
#[derive(Clone, Default)]
pub struct MemoryUserRepository {
    table: Arc<RwLock<Table>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.table.read().await.rows.len()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<User> {
        let wanted = username.to_lowercase();
        self.table
            .read()
            .await
            .rows
            .values()
            .find(|user| user.username.to_lowercase() == wanted)
            .cloned()
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))
    }

    async fn find_by_id(&self, id: i64) -> Result<User> {
        self.table
            .read()
            .await
            .rows
            .get(&id)
            .cloned()
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))
    }

    async fn insert(&self, user: NewUser) -> Result<User> {
        let mut table = self.table.write().await;
        let wanted = user.username.to_lowercase();
        if table.rows.values().any(|u| u.username.to_lowercase() == wanted) {
            return Err(AppError::DatabaseError(DatabaseError::Duplicate));
        }

        table.next_id += 1;
        let now = Utc::now();
        let record = User {
            id: table.next_id,
            username: user.username,
            password_hash: user.password_hash,
            two_factor_enabled: false,
            two_factor_secret: None,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<()> {
        let mut table = self.table.write().await;
        let user = table
            .rows
            .get_mut(&id)
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))?;
        changes.apply(user);
        user.updated_at = Utc::now();
        Ok(())
    }
}
