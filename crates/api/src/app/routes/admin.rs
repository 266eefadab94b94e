use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;

use tribal_auth::{permissions, User, UserView};
use tribal_core::{Page, UserId};
use tribal_infra::UserRepository;

use crate::app::dto;
use crate::app::errors::{parse_id, ApiError, ApiResult};
use crate::app::extract::{JsonBody, QueryParams};
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id/role", patch(change_role))
        .route("/users/:id/deactivate", post(deactivate_user))
        .route("/users/:id/activate", post(activate_user))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    QueryParams(query): QueryParams<dto::UserListQuery>,
) -> ApiResult<Json<Page<UserView>>> {
    require(ctx, &permissions::USERS_ADMIN)?;
    let page = services.store.list_users(query.role()?, query.page_request()).await?;
    Ok(Json(page.map(|u| UserView::from(&u))))
}

/// Admins manage other accounts, never their own.
fn target_other(ctx: PrincipalContext, id: &str) -> ApiResult<UserId> {
    require(ctx, &permissions::USERS_ADMIN)?;
    let target: UserId = parse_id(id, "user")?;
    if target == ctx.user_id() {
        return Err(ApiError::bad_request("admins cannot change their own account here"));
    }
    Ok(target)
}

#[tracing::instrument(skip_all, fields(target = %id))]
pub async fn change_role(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<dto::ChangeRoleRequest>,
) -> ApiResult<Json<UserView>> {
    let target = target_other(ctx, &id)?;
    let role = body.role;
    let user = services
        .store
        .modify_user(target, Box::new(move |u: &mut User| u.change_role(role, Utc::now())))
        .await?;
    tracing::info!(role = body.role.as_str(), "role changed");
    Ok(Json(UserView::from(&user)))
}

#[tracing::instrument(skip_all, fields(target = %id))]
pub async fn deactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    Path(id): Path<String>,
) -> ApiResult<Json<UserView>> {
    let target = target_other(ctx, &id)?;
    let user = services
        .store
        .modify_user(target, Box::new(|u: &mut User| u.deactivate(Utc::now())))
        .await?;
    tracing::info!("user deactivated");
    Ok(Json(UserView::from(&user)))
}

#[tracing::instrument(skip_all, fields(target = %id))]
pub async fn activate_user(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    Path(id): Path<String>,
) -> ApiResult<Json<UserView>> {
    let target = target_other(ctx, &id)?;
    let user = services
        .store
        .modify_user(target, Box::new(|u: &mut User| u.activate(Utc::now())))
        .await?;
    tracing::info!("user activated");
    Ok(Json(UserView::from(&user)))
}
