use actix_web::{web, HttpResponse};
use serde::Serialize;
use tracing::info;

use crate::auth::middleware::{CurrentUser, MaybeUser};
use crate::context::RequestContext;
use crate::db::PublicUser;
use crate::users::UserLookup;
use crate::{AppState, Result};

#[derive(Debug, Serialize)]
pub struct UserProfileResponse {
    #[serde(flatten)]
    pub user: PublicUser,
    pub is_self: bool,
}

pub async fn me(CurrentUser(user): CurrentUser) -> HttpResponse {
    HttpResponse::Ok().json(user)
}

/// Public profile; authenticated callers also learn whether it is their own.
pub async fn get_user(
    path: web::Path<i64>,
    viewer: MaybeUser,
    ctx: RequestContext,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    let user = state.user_service.public_user(user_id).await?;
    let is_self = viewer.0.map_or(false, |v| v.user_id == user.user_id);

    info!(request_id = %ctx.request_id, user_id, is_self, "user profile fetched");
    Ok(HttpResponse::Ok().json(UserProfileResponse { user, is_self }))
}
