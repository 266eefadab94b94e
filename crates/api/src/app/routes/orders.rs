use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;

use tribal_auth::{permissions, Principal};
use tribal_core::{OrderId, Page};
use tribal_infra::{CartRepository, OrderRepository, ProductRepository};
use tribal_orders::{plan_checkout, Cart, Order, OrderScope, OrderStatus};

use crate::app::dto;
use crate::app::errors::{parse_id, ApiError, ApiResult};
use crate::app::extract::{JsonBody, QueryParams};
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(checkout).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", patch(update_status))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/pay", post(pay_order))
}

/// Load an order visible to `principal`. Orders the caller may not see read as missing.
async fn visible_order(services: &AppServices, id: &str, principal: &Principal) -> ApiResult<Order> {
    let id: OrderId = parse_id(id, "order")?;
    services
        .store
        .get_order(id)
        .await?
        .filter(|o| o.is_visible_to(principal))
        .ok_or_else(|| ApiError::not_found("order"))
}

/// Cancel and restock in one store transaction.
async fn cancel(services: &AppServices, mut order: Order) -> ApiResult<Order> {
    let previous = order.status;
    order.cancel(Utc::now())?;
    services.store.cancel_order(&order, previous).await?;
    tracing::info!(order_id = %order.id, from = %previous, "order cancelled");
    Ok(order)
}

#[tracing::instrument(skip_all, fields(buyer_id = %ctx.user_id()))]
pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    JsonBody(body): JsonBody<dto::CheckoutRequest>,
) -> ApiResult<Response> {
    let principal = require(ctx, &permissions::ORDERS_PLACE)?;
    let cart = services
        .store
        .get_cart(principal.user_id)
        .await?
        .unwrap_or_else(|| Cart::new(principal.user_id, Utc::now()));
    let products = services.store.get_products(&cart.product_ids()).await?;

    let order = plan_checkout(
        principal.user_id,
        &cart,
        &products,
        &body.shipping_address,
        body.payment_method,
        &services.pricing,
        Utc::now(),
    )?;
    services.store.place_order(&order).await?;
    tracing::info!(order_id = %order.id, total = order.total.paise(), "order placed");
    Ok((StatusCode::CREATED, Json(order)).into_response())
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    QueryParams(query): QueryParams<dto::OrderListQuery>,
) -> ApiResult<Json<Page<Order>>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<OrderStatus>)
        .transpose()?;
    let scope = OrderScope::for_principal(&ctx.principal());
    Ok(Json(services.store.list_orders(scope, status, query.page_request()).await?))
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    Ok(Json(visible_order(&services, &id, &ctx.principal()).await?))
}

/// Fulfilment transitions. Moving to `cancelled` restocks like [`cancel_order`].
#[tracing::instrument(skip_all, fields(order_id = %id, status = %body.status))]
pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<dto::StatusUpdateRequest>,
) -> ApiResult<Json<Order>> {
    let principal = require(ctx, &permissions::ORDERS_FULFIL)?;
    let next: OrderStatus = body.status.parse()?;
    let mut order = visible_order(&services, &id, &principal).await?;
    order.ensure_fulfilable_by(&principal)?;

    if next == OrderStatus::Cancelled {
        return Ok(Json(cancel(&services, order).await?));
    }

    let previous = order.status;
    order.transition(next, Utc::now())?;
    services.store.update_order(&order, previous).await?;
    tracing::info!(from = %previous, "order status updated");
    Ok(Json(order))
}

/// The buyer who placed the order, or an admin.
#[tracing::instrument(skip_all, fields(order_id = %id))]
pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    let principal = require(ctx, &permissions::ORDERS_CANCEL)?;
    let order = visible_order(&services, &id, &principal).await?;
    order.ensure_cancellable_by(&principal)?;
    Ok(Json(cancel(&services, order).await?))
}

#[tracing::instrument(skip_all, fields(order_id = %id))]
pub async fn pay_order(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    let principal = require(ctx, &permissions::ORDERS_PAY)?;
    let mut order = visible_order(&services, &id, &principal).await?;
    order.mark_paid(&principal, Utc::now())?;
    services.store.update_order(&order, order.status).await?;
    tracing::info!(method = order.payment_method.as_str(), "order paid");
    Ok(Json(order))
}
