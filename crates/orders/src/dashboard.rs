//! Role dashboards computed from already-loaded records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use tribal_auth::{Role, User};
use tribal_catalog::Product;
use tribal_core::{DomainResult, Money, OrderId, ProductId, UserId};

use crate::{Cart, Order, OrderStatus};

const RECENT_ORDERS: usize = 5;
pub const LOW_STOCK_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub confirmed: u64,
    pub shipped: u64,
    pub delivered: u64,
    pub cancelled: u64,
}

impl StatusCounts {
    pub fn tally<I: IntoIterator<Item = OrderStatus>>(statuses: I) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            let slot = match status {
                OrderStatus::Pending => &mut counts.pending,
                OrderStatus::Confirmed => &mut counts.confirmed,
                OrderStatus::Shipped => &mut counts.shipped,
                OrderStatus::Delivered => &mut counts.delivered,
                OrderStatus::Cancelled => &mut counts.cancelled,
            };
            *slot += 1;
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoleCounts {
    pub buyer: u64,
    pub seller: u64,
    pub admin: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub buyer_id: UserId,
    pub status: OrderStatus,
    pub total: Money,
    pub item_count: u64,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderSummary {
    fn from(o: &Order) -> Self {
        Self {
            id: o.id,
            buyer_id: o.buyer_id,
            status: o.status,
            total: o.total,
            item_count: o.item_count(),
            created_at: o.created_at,
        }
    }
}

fn recent(orders: &[Order]) -> Vec<OrderSummary> {
    let mut sorted: Vec<&Order> = orders.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    sorted.into_iter().take(RECENT_ORDERS).map(OrderSummary::from).collect()
}

fn live_total<'a, I: IntoIterator<Item = &'a Order>>(orders: I) -> DomainResult<Money> {
    Money::sum(
        orders
            .into_iter()
            .filter(|o| o.status != OrderStatus::Cancelled)
            .map(|o| o.total),
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuyerDashboard {
    pub order_count: u64,
    pub orders_by_status: StatusCounts,
    /// Excludes cancelled orders.
    pub total_spent: Money,
    pub wishlist_size: u64,
    pub cart_lines: u64,
    pub recent_orders: Vec<OrderSummary>,
}

impl BuyerDashboard {
    pub fn build(orders: &[Order], wishlist_size: usize, cart: &Cart) -> DomainResult<Self> {
        Ok(Self {
            order_count: orders.len() as u64,
            orders_by_status: StatusCounts::tally(orders.iter().map(|o| o.status)),
            total_spent: live_total(orders)?,
            wishlist_size: wishlist_size as u64,
            cart_lines: cart.lines.len() as u64,
            recent_orders: recent(orders),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockItem {
    pub product_id: ProductId,
    pub name: String,
    pub stock: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SellerDashboard {
    pub active_products: u64,
    pub inactive_products: u64,
    pub low_stock: Vec<LowStockItem>,
    /// Sum of this seller's lines on non-cancelled orders.
    pub revenue: Money,
    pub units_sold: u64,
    pub order_count: u64,
    pub awaiting_fulfilment: u64,
}

impl SellerDashboard {
    /// `orders` should be the orders that involve `seller`; others are ignored.
    pub fn build(seller: UserId, products: &[Product], orders: &[Order]) -> DomainResult<Self> {
        let own: Vec<&Product> = products.iter().filter(|p| p.is_owned_by(seller)).collect();
        let active_products = own.iter().filter(|p| p.is_active).count() as u64;

        let mut low_stock: Vec<LowStockItem> = own
            .iter()
            .filter(|p| p.is_active && p.stock <= LOW_STOCK_THRESHOLD)
            .map(|p| LowStockItem {
                product_id: p.id,
                name: p.name.clone(),
                stock: p.stock,
            })
            .collect();
        low_stock.sort_by_key(|item| item.stock);

        let mine: Vec<&Order> = orders.iter().filter(|o| o.involves_seller(seller)).collect();
        let mut revenue = Money::ZERO;
        let mut units_sold = 0u64;
        for order in mine.iter().filter(|o| o.status != OrderStatus::Cancelled) {
            revenue = revenue.checked_add(order.seller_subtotal(seller)?)?;
            units_sold += order.seller_lines(seller).map(|l| u64::from(l.quantity)).sum::<u64>();
        }

        Ok(Self {
            active_products,
            inactive_products: own.len() as u64 - active_products,
            low_stock,
            revenue,
            units_sold,
            order_count: mine.len() as u64,
            awaiting_fulfilment: mine.iter().filter(|o| o.status.awaits_fulfilment()).count() as u64,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminDashboard {
    pub users_by_role: RoleCounts,
    pub active_users: u64,
    pub inactive_users: u64,
    pub product_count: u64,
    pub active_products: u64,
    pub orders_by_status: StatusCounts,
    pub gross_revenue: Money,
    pub recent_orders: Vec<OrderSummary>,
}

impl AdminDashboard {
    pub fn build(users: &[User], products: &[Product], orders: &[Order]) -> DomainResult<Self> {
        let mut users_by_role = RoleCounts::default();
        for user in users {
            match user.role {
                Role::Buyer => users_by_role.buyer += 1,
                Role::Seller => users_by_role.seller += 1,
                Role::Admin => users_by_role.admin += 1,
            }
        }
        let active_users = users.iter().filter(|u| u.is_active).count() as u64;

        Ok(Self {
            users_by_role,
            active_users,
            inactive_users: users.len() as u64 - active_users,
            product_count: products.len() as u64,
            active_products: products.iter().filter(|p| p.is_active).count() as u64,
            orders_by_status: StatusCounts::tally(orders.iter().map(|o| o.status)),
            gross_revenue: live_total(orders)?,
            recent_orders: recent(orders),
        })
    }
}
