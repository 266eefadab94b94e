use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tribal_auth::{Role, UserView};
use tribal_catalog::{Product, ProductQuery, ProductSort, RatingSummary, Review};
use tribal_core::{DomainResult, Money, PageRequest, ProductId, UserId};
use tribal_orders::{Cart, PaymentMethod, PricingPolicy, ShippingAddress};

use crate::app::errors::{parse_id, ApiError, ApiResult};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl UserListQuery {
    pub fn role(&self) -> ApiResult<Option<Role>> {
        self.role
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .map(|r| r.trim().parse::<Role>().map_err(ApiError::bad_request))
            .transpose()
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

/// Browse filters as they arrive on the query string.
#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub seller_id: Option<String>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub in_stock: Option<bool>,
    pub sort: Option<ProductSort>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ProductListQuery {
    /// Public browse query: active products only.
    pub fn to_query(&self) -> ApiResult<ProductQuery> {
        let seller_id = self
            .seller_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().parse::<UserId>())
            .transpose()?;
        let query = ProductQuery {
            q: self.q.clone(),
            category: self.category.clone(),
            seller_id,
            min_price: self.min_price.map(Money::from_paise),
            max_price: self.max_price.map(Money::from_paise),
            in_stock: self.in_stock.unwrap_or(false),
            include_inactive: false,
            sort: self.sort.unwrap_or_default(),
        };
        Ok(query.validated()?)
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

#[derive(Debug, Deserialize)]
pub struct WishlistAddRequest {
    pub product_id: String,
}

impl WishlistAddRequest {
    pub fn product_id(&self) -> ApiResult<ProductId> {
        parse_id(&self.product_id, "product")
    }
}

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub product_id: String,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

impl AddCartItemRequest {
    pub fn product_id(&self) -> ApiResult<ProductId> {
        parse_id(&self.product_id, "product")
    }
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl OrderListQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub to: String,
    pub body: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub rating: RatingSummary,
}

#[derive(Debug, Serialize)]
pub struct ReviewList {
    pub summary: RatingSummary,
    pub reviews: Vec<Review>,
}

#[derive(Debug, Serialize)]
pub struct WishlistItemView {
    pub product: Product,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
    pub stock: u32,
    pub is_active: bool,
}

/// Cart priced against current product data.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u64,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub total: Money,
}

impl CartView {
    /// Lines whose product has vanished are left out of the view.
    pub fn build(cart: &Cart, products: &[Product], pricing: &PricingPolicy) -> DomainResult<Self> {
        let mut lines = Vec::with_capacity(cart.lines.len());
        for line in &cart.lines {
            let Some(product) = products.iter().find(|p| p.id == line.product_id) else {
                continue;
            };
            lines.push(CartLineView {
                product_id: product.id,
                name: product.name.clone(),
                image: product.images.first().cloned(),
                unit_price: product.price,
                quantity: line.quantity,
                line_total: product.price.checked_mul(line.quantity)?,
                stock: product.stock,
                is_active: product.is_active,
            });
        }

        let subtotal = Money::sum(lines.iter().map(|l| l.line_total))?;
        let shipping_fee = if lines.is_empty() {
            Money::ZERO
        } else {
            pricing.shipping_for(subtotal)
        };
        Ok(Self {
            item_count: lines.iter().map(|l| u64::from(l.quantity)).sum(),
            total: subtotal.checked_add(shipping_fee)?,
            lines,
            subtotal,
            shipping_fee,
        })
    }
}
