use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;

use tribal_auth::permissions;
use tribal_catalog::{NewProduct, Product, ProductPatch, ProductQuery, RatingSummary};
use tribal_core::{Page, ProductId};
use tribal_infra::{ProductRepository, ReviewRepository};

use crate::app::dto;
use crate::app::errors::{parse_id, ApiError, ApiResult};
use crate::app::extract::{JsonBody, QueryParams};
use crate::app::routes::reviews;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/categories", get(list_categories))
        .route("/mine", get(my_products))
        .route("/:id", get(get_product).put(update_product).delete(delete_product))
        .route("/:id/reviews", get(reviews::list_reviews).post(reviews::create_review))
}

/// Fetch a product the caller may see. Hidden products read as missing.
pub(crate) async fn visible_product(
    services: &AppServices,
    id: &str,
    viewer: Option<&PrincipalContext>,
) -> ApiResult<Product> {
    let id: ProductId = parse_id(id, "product")?;
    let principal = viewer.map(PrincipalContext::principal);
    services
        .store
        .get_product(id)
        .await?
        .filter(|p| p.is_visible_to(principal.as_ref()))
        .ok_or_else(|| ApiError::not_found("product"))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    QueryParams(query): QueryParams<dto::ProductListQuery>,
) -> ApiResult<Json<Page<Product>>> {
    let page = services
        .store
        .search_products(&query.to_query()?, query.page_request())
        .await?;
    Ok(Json(page))
}

pub async fn list_categories(Extension(services): Extension<Arc<AppServices>>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(services.store.categories().await?))
}

/// The caller's own listings, including soft-deleted ones.
pub async fn my_products(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    QueryParams(query): QueryParams<dto::ProductListQuery>,
) -> ApiResult<Json<Page<Product>>> {
    let principal = require(ctx, &permissions::PRODUCTS_MANAGE)?;
    let filters = query.to_query()?;
    let mine = ProductQuery {
        seller_id: Some(principal.user_id),
        include_inactive: true,
        ..filters
    };
    Ok(Json(services.store.search_products(&mine, query.page_request()).await?))
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: Option<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<dto::ProductDetail>> {
    let product = visible_product(&services, &id, ctx.as_ref()).await?;
    let reviews = services.store.reviews_for_product(product.id).await?;
    Ok(Json(dto::ProductDetail {
        rating: RatingSummary::from_reviews(&reviews),
        product,
    }))
}

#[tracing::instrument(skip_all, fields(seller_id = %ctx.user_id()))]
pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    JsonBody(body): JsonBody<NewProduct>,
) -> ApiResult<Response> {
    let principal = require(ctx, &permissions::PRODUCTS_MANAGE)?;
    let product = Product::create(principal.user_id, body, Utc::now())?;
    services.store.insert_product(&product).await?;
    tracing::info!(product_id = %product.id, "product listed");
    Ok((StatusCode::CREATED, Json(product)).into_response())
}

#[tracing::instrument(skip_all, fields(product_id = %id))]
pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<ProductPatch>,
) -> ApiResult<Json<Product>> {
    let principal = require(ctx, &permissions::PRODUCTS_MANAGE)?;
    let product = visible_product(&services, &id, Some(&ctx)).await?;
    product.ensure_manageable_by(&principal)?;
    let updated = services
        .store
        .modify_product(
            product.id,
            Box::new(move |p: &mut Product| p.apply_patch(patch, Utc::now())),
        )
        .await?;
    Ok(Json(updated))
}

#[tracing::instrument(skip_all, fields(product_id = %id))]
pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let principal = require(ctx, &permissions::PRODUCTS_MANAGE)?;
    let product = visible_product(&services, &id, Some(&ctx)).await?;
    product.ensure_manageable_by(&principal)?;
    services
        .store
        .modify_product(product.id, Box::new(|p: &mut Product| p.soft_delete(Utc::now())))
        .await?;
    tracing::info!("product soft-deleted");
    Ok(StatusCode::NO_CONTENT)
}
