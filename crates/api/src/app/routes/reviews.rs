use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::delete,
    Json, Router,
};
use chrono::Utc;

use tribal_auth::permissions;
use tribal_catalog::{NewReview, RatingSummary, Review};
use tribal_core::{DomainError, ReviewId};
use tribal_infra::{OrderRepository, ReviewRepository};

use crate::app::dto;
use crate::app::errors::{parse_id, ApiError, ApiResult};
use crate::app::extract::JsonBody;
use crate::app::routes::products::visible_product;
use crate::app::routes::users::load_user;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

/// Routes under `/reviews`; listing and writing hang off `/products/:id/reviews`.
pub fn router() -> Router {
    Router::new().route("/:id", delete(delete_review))
}

pub async fn list_reviews(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<Json<dto::ReviewList>> {
    let product = visible_product(&services, &id, None).await?;
    let reviews = services.store.reviews_for_product(product.id).await?;
    Ok(Json(dto::ReviewList {
        summary: RatingSummary::from_reviews(&reviews),
        reviews,
    }))
}

#[tracing::instrument(skip_all, fields(product_id = %id, user_id = %ctx.user_id()))]
pub async fn create_review(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<NewReview>,
) -> ApiResult<Response> {
    let principal = require(ctx, &permissions::REVIEWS_WRITE)?;
    let product = visible_product(&services, &id, None).await?;
    if product.is_owned_by(principal.user_id) {
        return Err(DomainError::validation("you cannot review your own product").into());
    }

    let author = load_user(&services, principal.user_id).await?;
    let verified = services
        .store
        .has_delivered_purchase(principal.user_id, product.id)
        .await?;
    let review = Review::write(product.id, author.id, &author.name, body, verified, Utc::now())?;
    services.store.insert_review(&review).await?;
    tracing::info!(review_id = %review.id, verified, "review posted");
    Ok((StatusCode::CREATED, Json(review)).into_response())
}

#[tracing::instrument(skip_all, fields(review_id = %id))]
pub async fn delete_review(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id: ReviewId = parse_id(&id, "review")?;
    let review = services
        .store
        .get_review(id)
        .await?
        .ok_or_else(|| ApiError::not_found("review"))?;
    review.ensure_deletable_by(&ctx.principal())?;
    services.store.delete_review(review.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
