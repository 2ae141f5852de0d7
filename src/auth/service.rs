use chrono::Duration;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::auth::password::{hash_password, verify_password};
use crate::auth::tokens::{TokenManager, TokenPair, TokenType};
use crate::auth::two_factor::{Enrollment, TwoFactor};
use crate::config::AuthConfig;
use crate::context::RequestContext;
use crate::db::{NewUser, TwoFactorState, User, UserChanges, UserRepository};
use crate::error::{AppError, AuthError, DatabaseError};
use crate::store::{
    refresh_token_key, register_attempt_key, two_factor_challenge_key, EphemeralStore,
};
use crate::Result;

/// Result of a password login.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Tokens(TokenPair),
    /// Password accepted; the caller must finish with a 2FA code.
    TwoFactorRequired,
}

/// Orchestrates registration, login, token rotation, password changes and
/// the 2FA state machine.
///
/// Holds no mutable state of its own. All cross-request coordination goes
/// through the [`EphemeralStore`].
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    store: Arc<dyn EphemeralStore>,
    tokens: Arc<TokenManager>,
    two_factor: TwoFactor,
    bcrypt_cost: u32,
    registration_lock_ttl: Duration,
    challenge_ttl: Duration,
}

fn is_not_found(err: &AppError) -> bool {
    matches!(err, AppError::DatabaseError(DatabaseError::NotFound))
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        store: Arc<dyn EphemeralStore>,
        tokens: Arc<TokenManager>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            users,
            store,
            tokens,
            two_factor: TwoFactor::new(config.two_factor_issuer.clone()),
            bcrypt_cost: config.bcrypt_cost,
            registration_lock_ttl: Duration::hours(config.registration_lock_hours),
            challenge_ttl: Duration::seconds(config.two_factor_challenge_secs),
        }
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Loads a user the caller has already authenticated; a missing record
    /// means the credential outlived its account.
    async fn authenticated_user(&self, user_id: i64) -> Result<User> {
        match self.users.find_by_id(user_id).await {
            Ok(user) => Ok(user),
            Err(e) if is_not_found(&e) => {
                warn!("user not found");
                Err(AuthError::Unauthorized.into())
            }
            Err(e) => {
                error!(error = %e, "failed to load user");
                Err(e)
            }
        }
    }

    /// Registers `username`. The username lock taken in the coordination store
    /// is kept even when a later step fails, so a failed attempt still blocks
    /// the name until the lock expires.
    #[instrument(name = "register", skip_all, fields(request_id = %ctx.request_id, username = %username))]
    pub async fn register(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<TokenPair> {
        info!("register attempt");

        let key = register_attempt_key(username);
        if !self
            .store
            .set_if_absent(&key, "1", self.registration_lock_ttl)
            .await?
        {
            info!("username already claimed in coordination store");
            return Err(AuthError::UsernameTaken.into());
        }

        match self.users.find_by_username(username).await {
            Ok(_) => {
                info!("username already exists in database");
                return Err(AuthError::UsernameTaken.into());
            }
            Err(e) if is_not_found(&e) => {}
            Err(e) => {
                error!(error = %e, "user lookup failed");
                return Err(e);
            }
        }

        let password_hash = hash_password(password, self.bcrypt_cost).await?;
        let user = match self
            .users
            .insert(NewUser {
                username: username.trim().to_string(),
                password_hash,
            })
            .await
        {
            Ok(user) => user,
            Err(AppError::DatabaseError(DatabaseError::Duplicate)) => {
                info!("username inserted concurrently");
                return Err(AuthError::UsernameTaken.into());
            }
            Err(e) => {
                error!(error = %e, "user creation failed");
                return Err(e);
            }
        };

        let tokens = self.tokens.issue_pair(user.id)?;
        info!(user_id = user.id, "user registered successfully");
        Ok(tokens)
    }

    /// Password login. Unknown usernames and wrong passwords produce the same error.
    #[instrument(name = "login", skip_all, fields(request_id = %ctx.request_id, username = %username))]
    pub async fn login(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome> {
        info!("login attempt");

        let user = match self.users.find_by_username(username).await {
            Ok(user) => user,
            Err(e) => {
                if is_not_found(&e) {
                    info!("user not found");
                } else {
                    error!(error = %e, "user lookup failed");
                }
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !verify_password(password, &user.password_hash).await? {
            info!("invalid password provided");
            return Err(AuthError::InvalidCredentials.into());
        }

        if user.two_factor_enabled {
            // An existing challenge is fine: the login just rides on it.
            self.store
                .set_if_absent(&two_factor_challenge_key(user.id), "1", self.challenge_ttl)
                .await?;
            info!(user_id = user.id, "2FA required for user");
            return Ok(LoginOutcome::TwoFactorRequired);
        }

        let tokens = self.tokens.issue_pair(user.id)?;
        info!(user_id = user.id, "user logged in without 2FA");
        Ok(LoginOutcome::Tokens(tokens))
    }

    /// Completes a login that [`AuthService::login`] left pending on a 2FA code.
    #[instrument(name = "login_2fa", skip_all, fields(request_id = %ctx.request_id, username = %username))]
    pub async fn login_with_two_factor(
        &self,
        ctx: &RequestContext,
        username: &str,
        code: &str,
    ) -> Result<TokenPair> {
        let user = match self.users.find_by_username(username).await {
            Ok(user) => user,
            Err(e) => {
                if !is_not_found(&e) {
                    error!(error = %e, "user lookup failed");
                }
                // Same rejection as a known user without a challenge.
                warn!("user not found");
                return Err(AuthError::ChallengeNotInitiated.into());
            }
        };

        let key = two_factor_challenge_key(user.id);
        if !self.store.exists(&key).await? {
            warn!("no pending 2FA challenge, login flow not initiated");
            return Err(AuthError::ChallengeNotInitiated.into());
        }

        let secret = match (user.two_factor_enabled, user.two_factor_secret.as_deref()) {
            (true, Some(secret)) => secret,
            _ => {
                info!("2FA not enabled for user");
                return Err(AuthError::NotEnabled.into());
            }
        };

        // A wrong code leaves the challenge in place so the user can retry.
        if !self.two_factor.verify(secret, code)? {
            warn!("invalid 2FA code");
            return Err(AuthError::InvalidCode.into());
        }

        self.store.delete(&key).await?;

        let tokens = self.tokens.issue_pair(user.id)?;
        info!(user_id = user.id, "2FA verification successful, user logged in");
        Ok(tokens)
    }

    /// Exchanges a refresh token for a new pair. Each refresh token works once.
    #[instrument(name = "refresh_token", skip_all, fields(request_id = %ctx.request_id))]
    pub async fn refresh_token(&self, ctx: &RequestContext, refresh_token: &str) -> Result<TokenPair> {
        let claims = self.tokens.verify(refresh_token).map_err(|e| {
            info!("invalid token provided");
            e
        })?;

        if claims.token_type != TokenType::Refresh {
            info!(expected = %TokenType::Refresh, got = %claims.token_type, "wrong token type provided");
            return Err(AuthError::InvalidToken.into());
        }

        let ttl = self.tokens.remaining_lifetime(&claims);
        if ttl <= Duration::zero() {
            info!("token has expired");
            return Err(AuthError::InvalidToken.into());
        }

        let user_id = claims.user_id()?;

        // The ledger entry lives exactly as long as the token could.
        let key = refresh_token_key(&claims.jti);
        if !self.store.set_if_absent(&key, "1", ttl).await? {
            warn!(token_id = %claims.jti, "refresh token reused");
            return Err(AuthError::InvalidToken.into());
        }
        info!(token_id = %claims.jti, "refresh token consumed");

        let tokens = self.tokens.issue_pair(user_id)?;
        info!(user_id, "token successfully refreshed");
        Ok(tokens)
    }

    /// Outstanding tokens stay valid after a password change.
    #[instrument(name = "change_password", skip_all, fields(request_id = %ctx.request_id, user_id = user_id))]
    pub async fn change_password(
        &self,
        ctx: &RequestContext,
        user_id: i64,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let user = self.authenticated_user(user_id).await?;

        if !verify_password(old_password, &user.password_hash).await? {
            info!("incorrect old password");
            return Err(AuthError::IncorrectPassword.into());
        }

        if old_password == new_password {
            warn!("new password matches old password");
            return Err(AuthError::SamePassword.into());
        }

        let password_hash = hash_password(new_password, self.bcrypt_cost).await?;
        self.users
            .update(user.id, UserChanges::password(password_hash))
            .await
            .map_err(|e| {
                error!(error = %e, "failed to change password");
                e
            })?;

        info!("password changed");
        Ok(())
    }

    /// Starts (or restarts) enrollment: `disabled|pending -> pending`.
    #[instrument(name = "enable_2fa", skip_all, fields(request_id = %ctx.request_id, user_id = user_id))]
    pub async fn enable_two_factor(&self, ctx: &RequestContext, user_id: i64) -> Result<Enrollment> {
        let user = self.authenticated_user(user_id).await?;

        if user.two_factor_enabled {
            info!("2FA is already enabled");
            return Err(AuthError::AlreadyEnabled.into());
        }

        let enrollment = self.two_factor.enroll(&user.username)?;
        self.users
            .update(user.id, UserChanges::pending_secret(enrollment.secret.clone()))
            .await
            .map_err(|e| {
                error!(error = %e, "failed to store pending 2FA secret");
                e
            })?;

        info!("2FA enrollment started");
        Ok(enrollment)
    }

    /// Completes enrollment: `pending -> enabled`.
    #[instrument(name = "verify_2fa", skip_all, fields(request_id = %ctx.request_id, user_id = user_id))]
    pub async fn verify_two_factor(&self, ctx: &RequestContext, user_id: i64, code: &str) -> Result<()> {
        let user = self.authenticated_user(user_id).await?;

        let secret = match user.two_factor_state() {
            TwoFactorState::Enabled => {
                info!("2FA is already enabled");
                return Err(AuthError::AlreadyEnabled.into());
            }
            TwoFactorState::Disabled => {
                info!("no pending 2FA enrollment");
                return Err(AuthError::NotEnabled.into());
            }
            TwoFactorState::Pending => user.two_factor_secret.as_deref().unwrap_or_default(),
        };

        if !self.two_factor.verify(secret, code)? {
            warn!("invalid 2FA code");
            return Err(AuthError::InvalidCode.into());
        }

        self.users
            .update(user.id, UserChanges::enable_two_factor())
            .await
            .map_err(|e| {
                error!(error = %e, "failed to enable 2FA");
                e
            })?;

        info!("2FA enabled");
        Ok(())
    }

    /// `enabled|pending -> disabled`. Flag and secret are cleared in one update.
    #[instrument(name = "disable_2fa", skip_all, fields(request_id = %ctx.request_id, user_id = user_id))]
    pub async fn disable_two_factor(&self, ctx: &RequestContext, user_id: i64) -> Result<()> {
        let user = self.authenticated_user(user_id).await?;

        if user.two_factor_state() == TwoFactorState::Disabled {
            info!("2FA not enabled for user");
            return Err(AuthError::NotEnabled.into());
        }

        self.users
            .update(user.id, UserChanges::disable_two_factor())
            .await
            .map_err(|e| {
                error!(error = %e, "failed to disable 2FA");
                e
            })?;

        info!("2FA disabled");
        Ok(())
    }
}
