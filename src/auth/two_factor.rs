//! Time-based one-time codes for two-factor login.

use serde::Serialize;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::AppError;
use crate::Result;

const DIGITS: usize = 6;
const STEP_SECS: u64 = 30;
// Accept one step either side of the current one.
const SKEW: u8 = 1;

/// What a user needs to register the shared secret in an authenticator app.
#[derive(Debug, Clone, Serialize)]
pub struct Enrollment {
    pub secret: String,
    pub otpauth_url: String,
    pub qr_code: String,
}

#[derive(Debug, Clone)]
pub struct TwoFactor {
    issuer: String,
}

impl TwoFactor {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self { issuer: issuer.into() }
    }

    fn totp(&self, secret: Vec<u8>, account: &str) -> Result<TOTP> {
        TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW,
            STEP_SECS,
            secret,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|e| AppError::InternalError(format!("TOTP init error: {}", e)))
    }

    /// Generates a fresh secret and renders it for `username`.
    pub fn enroll(&self, username: &str) -> Result<Enrollment> {
        let secret = Secret::generate_secret()
            .to_bytes()
            .map_err(|e| AppError::InternalError(format!("secret generation error: {:?}", e)))?;
        let totp = self.totp(secret, &username.to_lowercase())?;

        let qr = totp
            .get_qr_base64()
            .map_err(|e| AppError::InternalError(format!("QR generation error: {}", e)))?;

        Ok(Enrollment {
            secret: totp.get_secret_base32(),
            otpauth_url: totp.get_url(),
            qr_code: format!("data:image/png;base64,{}", qr),
        })
    }

    /// Checks `code` against the base32 `secret` at the current time.
    pub fn verify(&self, secret: &str, code: &str) -> Result<bool> {
        let code = code.trim();
        if code.len() != DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(false);
        }

        let bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|e| AppError::InternalError(format!("stored 2FA secret is corrupt: {:?}", e)))?;
        let totp = self.totp(bytes, "user")?;

        totp.check_current(code)
            .map_err(|e| AppError::InternalError(format!("system clock error: {}", e)))
    }
}
