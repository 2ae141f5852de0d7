//! Bearer-token authentication as actix extractors.
//!
//! [`CurrentUser`] rejects the request when authentication fails, while
//! [`MaybeUser`] lets it through as a guest.

use actix_web::{dev::Payload, http::header::AUTHORIZATION, web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::tokens::{TokenManager, TokenType};
use crate::context::RequestContext;
use crate::db::PublicUser;
use crate::error::{AppError, AuthError};
use crate::users::UserLookup;
use crate::{AppState, Result};

const BEARER_PREFIX: &str = "bearer ";

/// Returns the token part of an `Authorization: Bearer <token>` header.
pub fn bearer_token(header: &str) -> Option<&str> {
    let prefix = header.get(..BEARER_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }

    let token = header[BEARER_PREFIX.len()..].trim();
    (!token.is_empty()).then_some(token)
}

pub struct AuthGate {
    tokens: Arc<TokenManager>,
    users: Arc<dyn UserLookup>,
}

impl AuthGate {
    pub fn new(tokens: Arc<TokenManager>, users: Arc<dyn UserLookup>) -> Self {
        Self { tokens, users }
    }

    async fn resolve(&self, token: &str) -> Result<PublicUser> {
        let claims = self.tokens.verify(token)?;
        claims.require_type(TokenType::Access)?;
        self.users.public_user(claims.user_id()?).await
    }

    /// Resolves the caller from the raw `Authorization` header value.
    pub async fn authenticate(&self, ctx: &RequestContext, header: Option<&str>) -> Result<PublicUser> {
        let token = header.and_then(bearer_token).ok_or_else(|| {
            info!(request_id = %ctx.request_id, "missing or malformed bearer token");
            AppError::AuthError(AuthError::MissingToken)
        })?;

        self.resolve(token).await.map_err(|e| {
            info!(request_id = %ctx.request_id, error = %e, "authentication failed");
            AppError::AuthError(AuthError::Unauthorized)
        })
    }

    /// Like [`AuthGate::authenticate`] but any failure yields a guest.
    pub async fn authenticate_optional(
        &self,
        ctx: &RequestContext,
        header: Option<&str>,
    ) -> Option<PublicUser> {
        let token = header.and_then(bearer_token)?;
        match self.resolve(token).await {
            Ok(user) => Some(user),
            Err(e) => {
                debug!(request_id = %ctx.request_id, error = %e, "proceeding as guest");
                None
            }
        }
    }
}

/// The authenticated caller. Extraction fails with 401 for anyone else.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub PublicUser);

/// The caller if a valid access token was presented, otherwise `None`.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<PublicUser>);

struct Credentials {
    gate: Result<Arc<AuthGate>>,
    header: Option<String>,
    ctx: RequestContext,
}

fn credentials(req: &HttpRequest) -> Credentials {
    let gate = req
        .app_data::<web::Data<AppState>>()
        .map(|state| state.auth_gate.clone())
        .ok_or_else(|| AppError::InternalError("application state is not registered".into()));
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned);

    Credentials {
        gate,
        header,
        ctx: RequestContext::from_http_request(req),
    }
}

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let Credentials { gate, header, ctx } = credentials(req);
        Box::pin(async move {
            let user = gate?.authenticate(&ctx, header.as_deref()).await?;
            Ok(CurrentUser(user))
        })
    }
}

impl FromRequest for MaybeUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let Credentials { gate, header, ctx } = credentials(req);
        Box::pin(async move {
            let user = gate?.authenticate_optional(&ctx, header.as_deref()).await;
            Ok(MaybeUser(user))
        })
    }
}
