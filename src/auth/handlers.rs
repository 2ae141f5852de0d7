use actix_web::{web, HttpResponse};
use tracing::info;
use validator::Validate;

use crate::auth::middleware::CurrentUser;
use crate::auth::models::{
    ChangePasswordRequest, Login2faRequest, LoginRequest, LoginResponse, MessageResponse,
    RefreshTokenRequest, RegisterRequest, TwoFactorSetupResponse, Verify2faRequest,
};
use crate::auth::service::LoginOutcome;
use crate::context::RequestContext;
use crate::{AppState, Result};

pub async fn register(
    ctx: RequestContext,
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    req.validate()?;
    let tokens = state
        .auth_service
        .register(&ctx, &req.username, &req.password)
        .await?;
    Ok(HttpResponse::Created().json(tokens))
}

pub async fn login(
    ctx: RequestContext,
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    req.validate()?;
    let response = match state
        .auth_service
        .login(&ctx, &req.username, &req.password)
        .await?
    {
        LoginOutcome::Tokens(tokens) => LoginResponse {
            requires_2fa: false,
            token: Some(tokens),
            message: None,
        },
        LoginOutcome::TwoFactorRequired => LoginResponse {
            requires_2fa: true,
            token: None,
            message: Some("2FA verification required, submit your code to /auth/login/2fa".into()),
        },
    };
    Ok(HttpResponse::Ok().json(response))
}

pub async fn login_2fa(
    ctx: RequestContext,
    req: web::Json<Login2faRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    req.validate()?;
    let tokens = state
        .auth_service
        .login_with_two_factor(&ctx, &req.username, &req.code)
        .await?;
    Ok(HttpResponse::Ok().json(tokens))
}

pub async fn refresh_token(
    ctx: RequestContext,
    req: web::Json<RefreshTokenRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    req.validate()?;
    let tokens = state.auth_service.refresh_token(&ctx, &req.refresh_token).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

pub async fn change_password(
    ctx: RequestContext,
    CurrentUser(user): CurrentUser,
    req: web::Json<ChangePasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    req.validate()?;
    state
        .auth_service
        .change_password(&ctx, user.user_id, &req.old_password, &req.new_password)
        .await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Password changed successfully")))
}

pub async fn enable_2fa(
    ctx: RequestContext,
    CurrentUser(user): CurrentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let enrollment = state.auth_service.enable_two_factor(&ctx, user.user_id).await?;
    Ok(HttpResponse::Ok().json(TwoFactorSetupResponse::from(enrollment)))
}

pub async fn verify_2fa(
    ctx: RequestContext,
    CurrentUser(user): CurrentUser,
    req: web::Json<Verify2faRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    req.validate()?;
    state
        .auth_service
        .verify_two_factor(&ctx, user.user_id, &req.code)
        .await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("2FA enabled successfully")))
}

pub async fn disable_2fa(
    ctx: RequestContext,
    CurrentUser(user): CurrentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state.auth_service.disable_two_factor(&ctx, user.user_id).await?;
    info!(request_id = %ctx.request_id, user_id = user.user_id, "2FA disabled via API");
    Ok(HttpResponse::Ok().json(MessageResponse::new("2FA disabled successfully")))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/login/2fa", web::post().to(login_2fa))
            .route("/refresh-token", web::post().to(refresh_token))
            .route("/change-password", web::post().to(change_password))
            .route("/enable-2fa", web::post().to(enable_2fa))
            .route("/verify-2fa", web::post().to(verify_2fa))
            .route("/disable-2fa", web::post().to(disable_2fa)),
    );
}
