use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;

use tribal_auth::{permissions, Principal};
use tribal_catalog::Product;
use tribal_core::{ProductId, UserId};
use tribal_infra::{CartRepository, ProductRepository};
use tribal_orders::Cart;

use crate::app::dto;
use crate::app::errors::{parse_id, ApiError, ApiResult};
use crate::app::extract::JsonBody;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:product_id", put(set_quantity).delete(remove_item))
}

fn buyer(ctx: PrincipalContext) -> ApiResult<Principal> {
    Ok(require(ctx, &permissions::CART_MANAGE)?)
}

async fn load_cart(services: &AppServices, buyer_id: UserId) -> ApiResult<Cart> {
    Ok(services
        .store
        .get_cart(buyer_id)
        .await?
        .unwrap_or_else(|| Cart::new(buyer_id, Utc::now())))
}

async fn load_product(services: &AppServices, id: ProductId) -> ApiResult<Product> {
    services
        .store
        .get_product(id)
        .await?
        .ok_or_else(|| ApiError::not_found("product"))
}

async fn cart_view(services: &AppServices, cart: &Cart) -> ApiResult<Json<dto::CartView>> {
    let products = services.store.get_products(&cart.product_ids()).await?;
    Ok(Json(dto::CartView::build(cart, &products, &services.pricing)?))
}

pub async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
) -> ApiResult<Json<dto::CartView>> {
    let principal = buyer(ctx)?;
    let cart = load_cart(&services, principal.user_id).await?;
    cart_view(&services, &cart).await
}

#[tracing::instrument(skip_all, fields(buyer_id = %ctx.user_id(), product_id = %body.product_id))]
pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    JsonBody(body): JsonBody<dto::AddCartItemRequest>,
) -> ApiResult<Json<dto::CartView>> {
    let principal = buyer(ctx)?;
    let product = load_product(&services, body.product_id()?).await?;
    if !product.is_active {
        return Err(ApiError::not_found("product"));
    }

    let quantity = body.quantity;
    let cart = services
        .store
        .modify_cart(
            principal.user_id,
            Box::new(|c: &mut Cart| c.add(&product, quantity, Utc::now())),
        )
        .await?;
    cart_view(&services, &cart).await
}

#[tracing::instrument(skip_all, fields(buyer_id = %ctx.user_id(), product_id = %product_id))]
pub async fn set_quantity(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    Path(product_id): Path<String>,
    JsonBody(body): JsonBody<dto::SetQuantityRequest>,
) -> ApiResult<Json<dto::CartView>> {
    let principal = buyer(ctx)?;
    let product_id: ProductId = parse_id(&product_id, "cart item")?;
    let product = services.store.get_product(product_id).await?;
    if product.is_none() && body.quantity > 0 {
        return Err(ApiError::not_found("product"));
    }

    let quantity = body.quantity;
    let cart = services
        .store
        .modify_cart(
            principal.user_id,
            Box::new(move |c: &mut Cart| match &product {
                Some(product) => c.set_quantity(product, quantity, Utc::now()),
                // A vanished product can only be dropped from the cart.
                None => c.remove(product_id, Utc::now()),
            }),
        )
        .await?;
    cart_view(&services, &cart).await
}

pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    Path(product_id): Path<String>,
) -> ApiResult<Json<dto::CartView>> {
    let principal = buyer(ctx)?;
    let product_id: ProductId = parse_id(&product_id, "cart item")?;
    let cart = services
        .store
        .modify_cart(
            principal.user_id,
            Box::new(move |c: &mut Cart| c.remove(product_id, Utc::now())),
        )
        .await?;
    cart_view(&services, &cart).await
}

pub async fn clear_cart(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
) -> ApiResult<StatusCode> {
    let principal = buyer(ctx)?;
    services
        .store
        .modify_cart(
            principal.user_id,
            Box::new(|c: &mut Cart| {
                c.clear(Utc::now());
                Ok(())
            }),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
