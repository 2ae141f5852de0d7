use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;
use std::time::Duration;

use crate::db::models::{NewUser, User, UserChanges};
use crate::error::{AppError, DatabaseError};
use crate::Result;

/// Durable storage of credential records.
///
/// Lookups that match nothing fail with [`DatabaseError::NotFound`], which
/// callers must be able to tell apart from every other failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Case-insensitive username lookup.
    async fn find_by_username(&self, username: &str) -> Result<User>;

    async fn find_by_id(&self, id: i64) -> Result<User>;

    async fn insert(&self, user: NewUser) -> Result<User>;

    /// Applies all supplied changes in a single-row update.
    async fn update(&self, id: i64, changes: UserChanges) -> Result<()>;
}

const USER_COLUMNS: &str =
    "id, username, password_hash, two_factor_enabled, two_factor_secret, created_at, updated_at";

pub struct PgUserRepository {
    pool: Arc<PgPool>,
}

impl PgUserRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| AppError::DatabaseError(DatabaseError::ConnectionError(e.to_string())))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn pool(&self) -> &Arc<PgPool> {
        &self.pool
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(username) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(self.pool.as_ref())
        .await?;

        user.ok_or(AppError::DatabaseError(DatabaseError::NotFound))
    }

    async fn find_by_id(&self, id: i64) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        user.ok_or(AppError::DatabaseError(DatabaseError::NotFound))
    }

    async fn insert(&self, user: NewUser) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.password_hash)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET updated_at = NOW()");
        if let Some(hash) = changes.password_hash {
            query.push(", password_hash = ").push_bind(hash);
        }
        if let Some(enabled) = changes.two_factor_enabled {
            query.push(", two_factor_enabled = ").push_bind(enabled);
        }
        if let Some(secret) = changes.two_factor_secret {
            query.push(", two_factor_secret = ").push_bind(secret);
        }
        query.push(" WHERE id = ").push_bind(id);

        let result = query.build().execute(self.pool.as_ref()).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::DatabaseError(DatabaseError::NotFound));
        }

        Ok(())
    }
}
