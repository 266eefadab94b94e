use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;

use tribal_auth::{hash_password, verify_password, PasswordError, ProfilePatch, User, UserView};
use tribal_core::{DomainError, UserId};
use tribal_infra::UserRepository;

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::extract::JsonBody;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/me", get(me).put(update_me))
        .route("/me/password", put(change_password))
}

/// Load a user that the auth middleware has already seen as active.
pub(crate) async fn load_user(services: &AppServices, id: UserId) -> ApiResult<User> {
    services
        .store
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("user"))
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
) -> ApiResult<Json<UserView>> {
    let user = load_user(&services, ctx.user_id()).await?;
    Ok(Json(UserView::from(&user)))
}

#[tracing::instrument(skip_all, fields(user_id = %ctx.user_id()))]
pub async fn update_me(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    JsonBody(patch): JsonBody<ProfilePatch>,
) -> ApiResult<Json<UserView>> {
    let user = services
        .store
        .modify_user(
            ctx.user_id(),
            Box::new(move |u: &mut User| u.apply_profile(patch, Utc::now())),
        )
        .await?;
    Ok(Json(UserView::from(&user)))
}

#[tracing::instrument(skip_all, fields(user_id = %ctx.user_id()))]
pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    JsonBody(body): JsonBody<dto::ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    let user = load_user(&services, ctx.user_id()).await?;
    verify_password(&body.current_password, &user.password_hash).map_err(|e| match e {
        PasswordError::Mismatch => ApiError::bad_request("current password is incorrect"),
        other => ApiError::from(other),
    })?;

    let hash = hash_password(&body.new_password)?;
    let verified_hash = user.password_hash;
    services
        .store
        .modify_user(
            ctx.user_id(),
            Box::new(move |u: &mut User| {
                // Another password change won the race; the current password no longer matches.
                if u.password_hash != verified_hash {
                    return Err(DomainError::conflict("password was changed concurrently"));
                }
                u.set_password_hash(hash, Utc::now());
                Ok(())
            }),
        )
        .await?;
    tracing::info!("password changed");
    Ok(StatusCode::NO_CONTENT)
}
