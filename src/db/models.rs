use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Durable credential record.
///
/// `two_factor_secret` is set while enrollment is pending and while 2FA is
/// enabled; it is never `None` when `two_factor_enabled` is true.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub two_factor_enabled: bool,
    pub two_factor_secret: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn two_factor_state(&self) -> TwoFactorState {
        match (self.two_factor_enabled, self.two_factor_secret.is_some()) {
            (true, _) => TwoFactorState::Enabled,
            (false, true) => TwoFactorState::Pending,
            (false, false) => TwoFactorState::Disabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TwoFactorState {
    Disabled,
    Pending,
    Enabled,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
}

/// Partial update of a credential record. Fields left as `None` are untouched;
/// `two_factor_secret: Some(None)` clears the secret.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub password_hash: Option<String>,
    pub two_factor_enabled: Option<bool>,
    pub two_factor_secret: Option<Option<String>>,
}

impl UserChanges {
    pub fn password(hash: String) -> Self {
        Self {
            password_hash: Some(hash),
            ..Self::default()
        }
    }

    pub fn pending_secret(secret: String) -> Self {
        Self {
            two_factor_secret: Some(Some(secret)),
            ..Self::default()
        }
    }

    pub fn enable_two_factor() -> Self {
        Self {
            two_factor_enabled: Some(true),
            ..Self::default()
        }
    }

    /// Clears the flag and the secret together.
    pub fn disable_two_factor() -> Self {
        Self {
            two_factor_enabled: Some(false),
            two_factor_secret: Some(None),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.password_hash.is_none()
            && self.two_factor_enabled.is_none()
            && self.two_factor_secret.is_none()
    }

    pub(crate) fn apply(self, user: &mut User) {
        if let Some(hash) = self.password_hash {
            user.password_hash = hash;
        }
        if let Some(enabled) = self.two_factor_enabled {
            user.two_factor_enabled = enabled;
        }
        if let Some(secret) = self.two_factor_secret {
            user.two_factor_secret = secret;
        }
    }
}

/// The view of a user that is safe to hand to request handlers and clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub user_id: i64,
    pub username: String,
    pub two_factor_enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            two_factor_enabled: user.two_factor_enabled,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: 1,
            username: "alice".into(),
            password_hash: "hash".into(),
            two_factor_enabled: false,
            two_factor_secret: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_two_factor_state_transitions() {
        let mut user = user();
        assert_eq!(user.two_factor_state(), TwoFactorState::Disabled);

        UserChanges::pending_secret("SECRET".into()).apply(&mut user);
        assert_eq!(user.two_factor_state(), TwoFactorState::Pending);

        UserChanges::enable_two_factor().apply(&mut user);
        assert_eq!(user.two_factor_state(), TwoFactorState::Enabled);

        UserChanges::disable_two_factor().apply(&mut user);
        assert_eq!(user.two_factor_state(), TwoFactorState::Disabled);
        assert!(user.two_factor_secret.is_none());
    }

    #[test]
    fn test_public_user_hides_credentials() {
        let json = serde_json::to_value(PublicUser::from(user())).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("two_factor_secret").is_none());
        assert_eq!(json["username"], "alice");
    }
}
