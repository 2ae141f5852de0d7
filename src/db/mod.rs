//! Database module for the blog backend
//!
//! Credential records, the repository contract the auth core consumes,
//! and its Postgres and in-process implementations.

pub mod memory;
pub mod models;
pub mod operations;

pub use memory::MemoryUserRepository;
pub use models::{NewUser, PublicUser, TwoFactorState, User, UserChanges};
pub use operations::{PgUserRepository, UserRepository};
