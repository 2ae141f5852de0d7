//! Request and response bodies of the `/auth` endpoints.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use validator::Validate;

use crate::auth::tokens::TokenPair;
use crate::auth::two_factor::Enrollment;

// Starts with a letter, ends alphanumeric, 4 to 32 characters in total.
static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]{2,30}[A-Za-z0-9]$").expect("username pattern is valid")
});

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(regex(
        path = *USERNAME_RE,
        message = "username must be 4-32 characters, start with a letter and contain only letters, digits and underscores"
    ))]
    pub username: String,
    #[validate(length(min = 6, max = 60, message = "password must be 6-60 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct Login2faRequest {
    #[validate(regex(
        path = *USERNAME_RE,
        message = "username must be 4-32 characters, start with a letter and contain only letters, digits and underscores"
    ))]
    pub username: String,
    #[validate(length(min = 1, message = "code is required"))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, message = "refresh_token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "old_password is required"))]
    pub old_password: String,
    #[validate(length(min = 6, max = 60, message = "new_password must be 6-60 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct Verify2faRequest {
    #[validate(length(min = 1, message = "code is required"))]
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub requires_2fa: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TwoFactorSetupResponse {
    pub secret: String,
    pub otpauth_url: String,
    pub qr_code: String,
    pub message: String,
}

impl From<Enrollment> for TwoFactorSetupResponse {
    fn from(enrollment: Enrollment) -> Self {
        Self {
            secret: enrollment.secret,
            otpauth_url: enrollment.otpauth_url,
            qr_code: enrollment.qr_code,
            message: "Scan the QR code with your authenticator app, then confirm with a code".into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn register(username: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_username_rules() {
        let long = format!("a{}b", "x".repeat(30));
        for ok in ["alice", "Bob_42", "abcd", "a_b_c_d1", long.as_str()] {
            assert!(register(ok, "Secret1!").validate().is_ok(), "{} should be valid", ok);
        }

        let too_long = "a".repeat(33);
        for bad in ["", "abc", "1alice", "_alice", "alice_", "al ice", "al-ice", too_long.as_str()] {
            let errors = register(bad, "Secret1!").validate().unwrap_err();
            assert!(errors.field_errors().contains_key("username"), "{} should be invalid", bad);
        }
    }

    #[test]
    fn test_username_rule_message_reaches_client() {
        let err = AppError::from(register("1alice", "Secret1!").validate().unwrap_err());
        match err {
            AppError::ValidationError(msg) => assert!(msg.contains("start with a letter"), "{}", msg),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_two_factor_login_checks_username() {
        let req = Login2faRequest {
            username: "_bad".into(),
            code: "123456".into(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_register_password_length() {
        assert!(register("alice", "Secret1!").validate().is_ok());
        assert!(register("alice", "12345").validate().is_err());
        assert!(register("alice", &"x".repeat(61)).validate().is_err());
        assert!(register("alice", &"x".repeat(60)).validate().is_ok());
    }

    #[test]
    fn test_login_requires_fields() {
        let empty = LoginRequest {
            username: String::new(),
            password: "x".into(),
        };
        let err = AppError::from(empty.validate().unwrap_err());
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_login_response_omits_absent_fields() {
        let challenge = LoginResponse {
            requires_2fa: true,
            token: None,
            message: Some("2FA required".into()),
        };
        let json = serde_json::to_value(&challenge).unwrap();
        assert_eq!(json["requires_2fa"], true);
        assert!(json.get("token").is_none());
        assert_eq!(json["message"], "2FA required");
    }
}
