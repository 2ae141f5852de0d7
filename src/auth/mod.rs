//! Authentication module for the blog backend
//!
//! Token issuance, the auth service flows (registration, login, 2FA,
//! refresh rotation, password change) and the extractors that guard routes.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;
pub mod tokens;
pub mod two_factor;

pub use middleware::{AuthGate, CurrentUser, MaybeUser};
pub use service::{AuthService, LoginOutcome};
pub use tokens::{Claims, TokenManager, TokenPair, TokenType};
