//! Orders and their fulfilment lifecycle.
//!
//! # Invariants
//! - Status moves `pending → confirmed → shipped → delivered`; only
//!   `pending` and `confirmed` orders may be cancelled. Everything else is an
//!   [`DomainError::InvariantViolation`].
//! - Lines are snapshots taken at checkout; later product edits never change
//!   a placed order.
//! - `total = subtotal + shipping_fee`.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tribal_auth::Principal;
use tribal_core::{
    required_text, validate_phone, Address, DomainError, DomainResult, Entity, Money, OrderId, ProductId, UserId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
        )
    }

    /// Placed but not yet handed to a courier.
    pub fn awaits_fulfilment(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::validation(format!("unknown order status '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    Card,
    Upi,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash_on_delivery" => Ok(PaymentMethod::CashOnDelivery),
            "card" => Ok(PaymentMethod::Card),
            "upi" => Ok(PaymentMethod::Upi),
            other => Err(DomainError::validation(format!("unknown payment method '{other}'"))),
        }
    }
}

/// Delivery destination captured on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    #[serde(flatten)]
    pub address: Address,
}

impl ShippingAddress {
    pub fn validated(&self) -> DomainResult<ShippingAddress> {
        Ok(ShippingAddress {
            full_name: required_text("full_name", &self.full_name, 100)?,
            phone: validate_phone(&self.phone)?,
            address: self.address.validated()?,
        })
    }
}

/// Snapshot of a purchased product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl OrderLine {
    pub fn line_total(&self) -> DomainResult<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: UserId,
    pub lines: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> OrderId {
        self.id
    }
}

impl Order {
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.iter().map(|l| l.product_id).collect()
    }

    pub fn involves_seller(&self, seller_id: UserId) -> bool {
        self.lines.iter().any(|l| l.seller_id == seller_id)
    }

    /// Buyer owner, a seller with a line in the order, or an admin.
    pub fn is_visible_to(&self, principal: &Principal) -> bool {
        principal.owns_or_admin(self.buyer_id) || self.involves_seller(principal.user_id)
    }

    pub fn seller_lines(&self, seller_id: UserId) -> impl Iterator<Item = &OrderLine> {
        self.lines.iter().filter(move |l| l.seller_id == seller_id)
    }

    pub fn seller_subtotal(&self, seller_id: UserId) -> DomainResult<Money> {
        self.seller_lines(seller_id)
            .map(OrderLine::line_total)
            .try_fold(Money::ZERO, |acc, line| acc.checked_add(line?))
    }

    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Apply a status transition. Delivering a cash-on-delivery order settles it.
    pub fn transition(&mut self, next: OrderStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invariant(format!(
                "cannot move order from {} to {}",
                self.status, next
            )));
        }
        self.status = next;
        if next == OrderStatus::Delivered && self.payment_method == PaymentMethod::CashOnDelivery && !self.is_paid {
            self.is_paid = true;
            self.paid_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Sellers with a line in the order and admins drive fulfilment.
    pub fn ensure_fulfilable_by(&self, principal: &Principal) -> DomainResult<()> {
        if principal.is_admin() || self.involves_seller(principal.user_id) {
            Ok(())
        } else {
            Err(DomainError::forbidden("you have no items in this order"))
        }
    }

    /// Only the buyer who placed the order, or an admin. Sellers cancel
    /// through a fulfilment transition instead.
    pub fn ensure_cancellable_by(&self, principal: &Principal) -> DomainResult<()> {
        if principal.owns_or_admin(self.buyer_id) {
            Ok(())
        } else {
            Err(DomainError::forbidden("you may not cancel this order"))
        }
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(OrderStatus::Cancelled, now)
    }

    /// Record payment by the buyer.
    pub fn mark_paid(&mut self, principal: &Principal, now: DateTime<Utc>) -> DomainResult<()> {
        if principal.user_id != self.buyer_id {
            return Err(DomainError::forbidden("only the buyer may pay for this order"));
        }
        if self.status == OrderStatus::Cancelled {
            return Err(DomainError::invariant("cannot pay for a cancelled order"));
        }
        if self.is_paid {
            return Err(DomainError::conflict("order is already paid"));
        }
        self.is_paid = true;
        self.paid_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

/// Which orders a listing may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    Buyer(UserId),
    Seller(UserId),
    All,
}

impl OrderScope {
    pub fn for_principal(principal: &Principal) -> Self {
        use tribal_auth::Role;
        match principal.role {
            Role::Admin => OrderScope::All,
            Role::Seller => OrderScope::Seller(principal.user_id),
            Role::Buyer => OrderScope::Buyer(principal.user_id),
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        match self {
            OrderScope::Buyer(id) => order.buyer_id == *id,
            OrderScope::Seller(id) => order.involves_seller(*id),
            OrderScope::All => true,
        }
    }
}
