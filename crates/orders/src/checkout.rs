//! Checkout: turn a cart into a priced, pending order.
//!
//! Planning is pure. Reserving stock, inserting the order and clearing the
//! cart happen together in the store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use tribal_catalog::Product;
use tribal_core::{DomainError, DomainResult, Money, OrderId, ProductId, UserId};

use crate::{Cart, Order, OrderLine, OrderStatus, PaymentMethod, ShippingAddress};

/// Shipping charges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Orders with a subtotal at or above this ship free.
    pub free_shipping_threshold: Money,
    pub shipping_fee: Money,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Money::from_paise(50_000),
            shipping_fee: Money::from_paise(5_000),
        }
    }
}

impl PricingPolicy {
    pub fn shipping_for(&self, subtotal: Money) -> Money {
        if subtotal >= self.free_shipping_threshold {
            Money::ZERO
        } else {
            self.shipping_fee
        }
    }
}

/// Validate `cart` against current `products` and build the order to place.
pub fn plan_checkout(
    buyer: UserId,
    cart: &Cart,
    products: &[Product],
    address: &ShippingAddress,
    payment_method: PaymentMethod,
    pricing: &PricingPolicy,
    now: DateTime<Utc>,
) -> DomainResult<Order> {
    if cart.is_empty() {
        return Err(DomainError::validation("cart is empty"));
    }
    let shipping_address = address.validated()?;
    let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();

    let mut lines = Vec::with_capacity(cart.lines.len());
    for item in &cart.lines {
        let product = by_id
            .get(&item.product_id)
            .filter(|p| p.is_active)
            .ok_or_else(|| DomainError::conflict(format!("product {} is no longer available", item.product_id)))?;
        if product.is_owned_by(buyer) {
            return Err(DomainError::validation("you cannot buy your own product"));
        }
        if product.stock < item.quantity {
            return Err(DomainError::conflict(format!(
                "insufficient stock for '{}' (available: {})",
                product.name, product.stock
            )));
        }
        lines.push(OrderLine {
            product_id: product.id,
            seller_id: product.seller_id,
            name: product.name.clone(),
            unit_price: product.price,
            quantity: item.quantity,
        });
    }

    let subtotal = lines
        .iter()
        .map(OrderLine::line_total)
        .try_fold(Money::ZERO, |acc, line| acc.checked_add(line?))?;
    let shipping_fee = pricing.shipping_for(subtotal);
    let total = subtotal.checked_add(shipping_fee)?;

    Ok(Order {
        id: OrderId::new(),
        buyer_id: buyer,
        lines,
        shipping_address,
        payment_method,
        status: OrderStatus::Pending,
        is_paid: false,
        paid_at: None,
        subtotal,
        shipping_fee,
        total,
        created_at: now,
        updated_at: now,
    })
}
