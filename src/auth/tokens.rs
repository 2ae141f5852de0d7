use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AppError, AuthError};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Access => f.write_str("access"),
            TokenType::Refresh => f.write_str("refresh"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub sub: String,  // User ID
    pub jti: String,  // Unique token ID
    pub iat: i64,     // Issued at
    pub exp: i64,     // Expiration time
}

impl Claims {
    pub fn user_id(&self) -> Result<i64> {
        self.sub
            .parse()
            .map_err(|_| AppError::AuthError(AuthError::InvalidToken))
    }

    /// Fails with `InvalidToken` unless the token is of the `expected` type.
    pub fn require_type(&self, expected: TokenType) -> Result<()> {
        if self.token_type == expected {
            Ok(())
        } else {
            Err(AuthError::InvalidToken.into())
        }
    }
}

/// Access and refresh tokens minted together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub access_token_expires_in: i64,
    pub refresh_token: String,
    pub refresh_token_expires_in: i64,
}

/// Stateless HS256 signer and verifier for bearer tokens.
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenManager {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            Duration::minutes(config.access_token_ttl_minutes),
            Duration::days(config.refresh_token_ttl_days),
        )
    }

    pub fn ttl(&self, token_type: TokenType) -> Duration {
        match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        }
    }

    /// Mints a signed token for `user_id`. Every token gets a fresh `jti`.
    pub fn issue(&self, user_id: i64, token_type: TokenType) -> Result<(String, Duration)> {
        let ttl = self.ttl(token_type);
        let now = Utc::now();
        let claims = Claims {
            token_type,
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok((token, ttl))
    }

    pub fn issue_pair(&self, user_id: i64) -> Result<TokenPair> {
        let (access_token, access_ttl) = self.issue(user_id, TokenType::Access)?;
        let (refresh_token, refresh_ttl) = self.issue(user_id, TokenType::Refresh)?;

        Ok(TokenPair {
            access_token,
            access_token_expires_in: access_ttl.num_seconds(),
            refresh_token,
            refresh_token_expires_in: refresh_ttl.num_seconds(),
        })
    }

    /// Checks signature, expiry and structure. The token type is left to the caller.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("token verification failed: {}", e);
                AppError::AuthError(AuthError::InvalidToken)
            })
    }

    /// Time left before `claims` expire, never negative.
    pub fn remaining_lifetime(&self, claims: &Claims) -> Duration {
        let remaining = Duration::seconds(claims.exp - Utc::now().timestamp());
        remaining.max(Duration::zero())
    }
}
