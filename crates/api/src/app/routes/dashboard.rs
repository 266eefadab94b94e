use std::sync::Arc;

use axum::{extract::Extension, routing::get, Json, Router};
use chrono::Utc;

use tribal_auth::permissions;
use tribal_infra::{CartRepository, OrderRepository, ProductRepository, UserRepository, WishlistRepository};
use tribal_orders::{AdminDashboard, BuyerDashboard, Cart, OrderScope, SellerDashboard};

use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/buyer", get(buyer_dashboard))
        .route("/seller", get(seller_dashboard))
        .route("/admin", get(admin_dashboard))
}

pub async fn buyer_dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
) -> ApiResult<Json<BuyerDashboard>> {
    let principal = require(ctx, &permissions::DASHBOARD_BUYER)?;
    let me = principal.user_id;

    let orders = services.store.orders_for(OrderScope::Buyer(me)).await?;
    let wishlist = services.store.get_wishlist(me).await?;
    let cart = services
        .store
        .get_cart(me)
        .await?
        .unwrap_or_else(|| Cart::new(me, Utc::now()));
    Ok(Json(BuyerDashboard::build(&orders, wishlist.len(), &cart)?))
}

pub async fn seller_dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
) -> ApiResult<Json<SellerDashboard>> {
    let principal = require(ctx, &permissions::DASHBOARD_SELLER)?;
    let me = principal.user_id;

    let products = services.store.products_by_seller(me).await?;
    let orders = services.store.orders_for(OrderScope::Seller(me)).await?;
    Ok(Json(SellerDashboard::build(me, &products, &orders)?))
}

/// Marketplace-wide totals. Loads every user, product and order.
pub async fn admin_dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: PrincipalContext,
) -> ApiResult<Json<AdminDashboard>> {
    require(ctx, &permissions::DASHBOARD_ADMIN)?;

    let users = services.store.all_users().await?;
    let products = services.store.all_products().await?;
    let orders = services.store.orders_for(OrderScope::All).await?;
    Ok(Json(AdminDashboard::build(&users, &products, &orders)?))
}
