//! User lookups for request authentication and the `/users` endpoints.

pub mod handlers;

use async_trait::async_trait;
use std::sync::Arc;

use crate::db::{PublicUser, UserRepository};
use crate::Result;

/// Resolves a user id to the view handlers are allowed to see.
#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn public_user(&self, user_id: i64) -> Result<PublicUser>;
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl UserLookup for UserService {
    async fn public_user(&self, user_id: i64) -> Result<PublicUser> {
        self.users.find_by_id(user_id).await.map(PublicUser::from)
    }
}
