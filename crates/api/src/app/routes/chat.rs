use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{sse::Event as SseEvent, IntoResponse, Response, Sse},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use tribal_auth::permissions;
use tribal_core::UserId;
use tribal_infra::UserRepository;

use crate::app::chat::{self, ChatMessage};
use crate::app::dto;
use crate::app::errors::{parse_id, ApiError, ApiResult};
use crate::app::extract::JsonBody;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/messages", post(send_message))
        .route("/stream", get(stream))
        .route("/conversations/:user_id", get(conversation))
}

#[tracing::instrument(skip_all, fields(from = %ctx.user_id()))]
pub async fn send_message(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    JsonBody(body): JsonBody<dto::SendMessageRequest>,
) -> ApiResult<Response> {
    let principal = require(ctx, &permissions::CHAT_USE)?;
    let to: UserId = parse_id(&body.to, "recipient")?;
    services
        .store
        .get_user(to)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::not_found("recipient"))?;

    let message = services.chat.send(principal.user_id, to, &body.body, Utc::now())?;
    tracing::debug!(message_id = %message.id, %to, "chat message relayed");
    Ok((StatusCode::CREATED, Json(message)).into_response())
}

/// Server-sent events: one `message` event per message sent to or by the caller.
pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
) -> ApiResult<Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>>> {
    let principal = require(ctx, &permissions::CHAT_USE)?;
    Ok(chat::sse_stream(services.chat.subscribe(), principal.user_id))
}

pub async fn conversation(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let principal = require(ctx, &permissions::CHAT_USE)?;
    let other: UserId = parse_id(&user_id, "user")?;
    Ok(Json(services.chat.conversation(principal.user_id, other)))
}
