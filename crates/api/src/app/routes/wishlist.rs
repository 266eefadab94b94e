use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use chrono::Utc;

use tribal_auth::permissions;
use tribal_catalog::Wishlist;
use tribal_core::{DomainError, ProductId};
use tribal_infra::{ProductRepository, WishlistRepository};

use crate::app::dto;
use crate::app::errors::{parse_id, ApiError, ApiResult};
use crate::app::extract::JsonBody;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_wishlist).post(add_to_wishlist))
        .route("/:product_id", delete(remove_from_wishlist))
}

/// Saved products that are still listed, in the order they were added.
async fn wishlist_view(services: &AppServices, wishlist: &Wishlist) -> ApiResult<Vec<dto::WishlistItemView>> {
    let products = services.store.get_products(&wishlist.product_ids()).await?;
    Ok(wishlist
        .entries
        .iter()
        .filter_map(|entry| {
            products
                .iter()
                .find(|p| p.id == entry.product_id && p.is_active)
                .map(|p| dto::WishlistItemView {
                    product: p.clone(),
                    added_at: entry.added_at,
                })
        })
        .collect())
}

pub async fn get_wishlist(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
) -> ApiResult<Json<Vec<dto::WishlistItemView>>> {
    let principal = require(ctx, &permissions::WISHLIST_MANAGE)?;
    let wishlist = services.store.get_wishlist(principal.user_id).await?;
    Ok(Json(wishlist_view(&services, &wishlist).await?))
}

/// 201 when the product was added, 200 when it was already saved.
pub async fn add_to_wishlist(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    JsonBody(body): JsonBody<dto::WishlistAddRequest>,
) -> ApiResult<Response> {
    let principal = require(ctx, &permissions::WISHLIST_MANAGE)?;
    let product_id = body.product_id()?;
    services
        .store
        .get_product(product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ApiError::not_found("product"))?;

    let mut added = false;
    let wishlist = services
        .store
        .modify_wishlist(
            principal.user_id,
            Box::new(|w: &mut Wishlist| {
                added = w.add(product_id, Utc::now())?;
                Ok(())
            }),
        )
        .await?;

    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(wishlist_view(&services, &wishlist).await?)).into_response())
}

pub async fn remove_from_wishlist(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    Path(product_id): Path<String>,
) -> ApiResult<StatusCode> {
    let principal = require(ctx, &permissions::WISHLIST_MANAGE)?;
    let product_id: ProductId = parse_id(&product_id, "wishlist item")?;

    services
        .store
        .modify_wishlist(
            principal.user_id,
            Box::new(move |w: &mut Wishlist| {
                if w.remove(product_id) {
                    Ok(())
                } else {
                    Err(DomainError::not_found("wishlist item"))
                }
            }),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
