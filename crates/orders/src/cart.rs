//! Shopping cart.
//!
//! # Invariants
//! - At most one line per product; quantities are 1..=[`MAX_LINE_QUANTITY`].
//! - At most [`MAX_CART_LINES`] distinct products.
//! - Stock is checked when lines change but only reserved at checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tribal_catalog::Product;
use tribal_core::{DomainError, DomainResult, ProductId, UserId};

pub const MAX_LINE_QUANTITY: u32 = 99;
pub const MAX_CART_LINES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub buyer_id: UserId,
    pub lines: Vec<CartLine>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(buyer_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            buyer_id,
            lines: Vec::new(),
            updated_at: now,
        }
    }

    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    fn ensure_can_hold(&self, product: &Product, quantity: u32) -> DomainResult<()> {
        if product.is_owned_by(self.buyer_id) {
            return Err(DomainError::validation("you cannot buy your own product"));
        }
        if !product.is_active {
            return Err(DomainError::conflict(format!("product '{}' is not available", product.name)));
        }
        if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(DomainError::validation(format!(
                "quantity must be between 1 and {MAX_LINE_QUANTITY}"
            )));
        }
        if product.stock < quantity {
            return Err(DomainError::conflict(format!(
                "insufficient stock for '{}' (available: {})",
                product.name, product.stock
            )));
        }
        Ok(())
    }

    /// Add `quantity` units, merging into an existing line.
    pub fn add(&mut self, product: &Product, quantity: u32, now: DateTime<Utc>) -> DomainResult<()> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }
        match self.lines.iter().position(|l| l.product_id == product.id) {
            Some(idx) => {
                let merged = self.lines[idx].quantity.saturating_add(quantity);
                self.ensure_can_hold(product, merged)?;
                self.lines[idx].quantity = merged;
            }
            None => {
                if self.lines.len() >= MAX_CART_LINES {
                    return Err(DomainError::validation(format!(
                        "cart is limited to {MAX_CART_LINES} products"
                    )));
                }
                self.ensure_can_hold(product, quantity)?;
                self.lines.push(CartLine {
                    product_id: product.id,
                    quantity,
                    added_at: now,
                });
            }
        }
        self.updated_at = now;
        Ok(())
    }

    /// Replace a line's quantity; zero removes the line.
    pub fn set_quantity(&mut self, product: &Product, quantity: u32, now: DateTime<Utc>) -> DomainResult<()> {
        let idx = self
            .lines
            .iter()
            .position(|l| l.product_id == product.id)
            .ok_or_else(|| DomainError::not_found("cart item"))?;
        if quantity == 0 {
            self.lines.remove(idx);
        } else {
            self.ensure_can_hold(product, quantity)?;
            self.lines[idx].quantity = quantity;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn remove(&mut self, product_id: ProductId, now: DateTime<Utc>) -> DomainResult<()> {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        if self.lines.len() == before {
            return Err(DomainError::not_found("cart item"));
        }
        self.updated_at = now;
        Ok(())
    }

    /// Drop every line for `product_ids`, ignoring ids not in the cart.
    pub fn remove_products(&mut self, product_ids: &[ProductId], now: DateTime<Utc>) {
        self.lines.retain(|l| !product_ids.contains(&l.product_id));
        self.updated_at = now;
    }

    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.lines.clear();
        self.updated_at = now;
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.iter().map(|l| l.product_id).collect()
    }

    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }
}
