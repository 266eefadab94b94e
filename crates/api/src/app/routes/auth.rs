use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;

use tribal_auth::{hash_password, normalize_email, verify_password, NewUser, PasswordError, Role, User, UserView};
use tribal_infra::UserRepository;

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::extract::JsonBody;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[tracing::instrument(skip_all, fields(role = tracing::field::Empty))]
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<dto::RegisterRequest>,
) -> ApiResult<Response> {
    let role = body.role.unwrap_or(Role::Buyer);
    tracing::Span::current().record("role", role.as_str());

    let new = NewUser {
        name: body.name,
        email: body.email,
        role,
        phone: body.phone,
    };
    let hash = hash_password(&body.password)?;
    let user = User::register(new, hash, Utc::now())?;

    services.store.insert_user(&user).await?;
    tracing::info!(user_id = %user.id, "registered user");

    let token = services.issue_token(&user)?;
    Ok((
        StatusCode::CREATED,
        Json(dto::AuthResponse {
            token,
            user: UserView::from(&user),
        }),
    )
        .into_response())
}

#[tracing::instrument(skip_all)]
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<dto::LoginRequest>,
) -> ApiResult<Json<dto::AuthResponse>> {
    let bad_credentials = || ApiError::from(PasswordError::Mismatch);

    let email = normalize_email(&body.email).map_err(|_| bad_credentials())?;
    let user = services
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(bad_credentials)?;
    verify_password(&body.password, &user.password_hash)?;
    if !user.is_active {
        return Err(ApiError::unauthorized("account is deactivated"));
    }

    tracing::info!(user_id = %user.id, "login");
    let token = services.issue_token(&user)?;
    Ok(Json(dto::AuthResponse {
        token,
        user: UserView::from(&user),
    }))
}
