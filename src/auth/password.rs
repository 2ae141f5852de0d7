//! Password hashing via bcrypt.
//!
//! Both operations run on the blocking thread pool.

use crate::error::AppError;
use crate::Result;

pub async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::InternalError(format!("bcrypt task failed: {}", e)))?
        .map_err(|e| AppError::InternalError(format!("bcrypt hash: {}", e)))
}

/// An unparseable stored hash counts as a mismatch.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .map_err(|e| AppError::InternalError(format!("bcrypt task failed: {}", e)))
}
