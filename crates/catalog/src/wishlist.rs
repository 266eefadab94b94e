use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tribal_core::{DomainError, DomainResult, ProductId, UserId};

pub const MAX_WISHLIST_ENTRIES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub product_id: ProductId,
    pub added_at: DateTime<Utc>,
}

/// A buyer's saved products, oldest first, without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wishlist {
    pub user_id: UserId,
    pub entries: Vec<WishlistEntry>,
}

impl Wishlist {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            entries: Vec::new(),
        }
    }

    pub fn contains(&self, product_id: ProductId) -> bool {
        self.entries.iter().any(|e| e.product_id == product_id)
    }

    /// Returns `false` when the product was already saved.
    pub fn add(&mut self, product_id: ProductId, now: DateTime<Utc>) -> DomainResult<bool> {
        if self.contains(product_id) {
            return Ok(false);
        }
        if self.entries.len() >= MAX_WISHLIST_ENTRIES {
            return Err(DomainError::validation(format!(
                "wishlist is limited to {MAX_WISHLIST_ENTRIES} products"
            )));
        }
        self.entries.push(WishlistEntry {
            product_id,
            added_at: now,
        });
        Ok(true)
    }

    /// Returns `false` when the product was not saved.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.product_id != product_id);
        self.entries.len() != before
    }

    pub fn product_ids(&self) -> Vec<ProductId> {
        self.entries.iter().map(|e| e.product_id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
