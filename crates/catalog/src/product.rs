//! Product listings.
//!
//! # Invariants
//! - A product always belongs to exactly one seller.
//! - `price` is strictly positive; `category` is stored trimmed and lowercase.
//! - Deletion is soft: `is_active` flips to false and the row stays so past
//!   orders and reviews keep resolving.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tribal_auth::Principal;
use tribal_core::{optional_text, required_text, DomainError, DomainResult, Entity, Money, ProductId, UserId};

pub const MAX_NAME_CHARS: usize = 120;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;
pub const MAX_CATEGORY_CHARS: usize = 60;
pub const MAX_ATTRIBUTE_CHARS: usize = 100;
pub const MAX_IMAGES: usize = 10;
pub const MAX_IMAGE_URL_CHARS: usize = 2048;

/// A handcrafted item listed by a seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: UserId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: Money,
    pub stock: u32,
    pub images: Vec<String>,
    /// Community the craft comes from (e.g. "Gond", "Warli").
    pub tribe: Option<String>,
    pub region: Option<String>,
    pub material: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }
}

/// Input for listing a new product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub price: Money,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tribe: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
}

/// Partial update. `None` leaves a field untouched; an empty string clears an
/// optional attribute.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Money>,
    pub stock: Option<u32>,
    pub images: Option<Vec<String>>,
    pub tribe: Option<String>,
    pub region: Option<String>,
    pub material: Option<String>,
    pub is_active: Option<bool>,
}

fn validate_name(raw: &str) -> DomainResult<String> {
    required_text("name", raw, MAX_NAME_CHARS)
}

fn validate_description(raw: &str) -> DomainResult<String> {
    optional_text("description", raw, MAX_DESCRIPTION_CHARS)
}

/// Trim and lowercase a category so "Paintings " and "paintings" group together.
pub fn normalize_category(raw: &str) -> DomainResult<String> {
    required_text("category", raw, MAX_CATEGORY_CHARS).map(|c| c.to_lowercase())
}

fn validate_price(price: Money) -> DomainResult<Money> {
    if price.is_zero() {
        return Err(DomainError::validation("price must be greater than zero"));
    }
    Ok(price)
}

fn validate_images(images: &[String]) -> DomainResult<Vec<String>> {
    if images.len() > MAX_IMAGES {
        return Err(DomainError::validation(format!(
            "at most {MAX_IMAGES} images are allowed"
        )));
    }
    images
        .iter()
        .map(|raw| {
            let url = required_text("image url", raw, MAX_IMAGE_URL_CHARS)?;
            if url.starts_with("https://") || url.starts_with("http://") || url.starts_with('/') {
                Ok(url)
            } else {
                Err(DomainError::validation(format!("image url '{url}' must be http(s) or site-relative")))
            }
        })
        .collect()
}

fn validate_attribute(field: &str, raw: Option<&str>) -> DomainResult<Option<String>> {
    match raw {
        Some(value) => Ok(Some(optional_text(field, value, MAX_ATTRIBUTE_CHARS)?).filter(|v| !v.is_empty())),
        None => Ok(None),
    }
}

impl Product {
    /// List a new product for `seller_id`. New listings are active.
    pub fn create(seller_id: UserId, new: NewProduct, now: DateTime<Utc>) -> DomainResult<Product> {
        Ok(Product {
            id: ProductId::new(),
            seller_id,
            name: validate_name(&new.name)?,
            description: validate_description(&new.description)?,
            category: normalize_category(&new.category)?,
            price: validate_price(new.price)?,
            stock: new.stock,
            images: validate_images(&new.images)?,
            tribe: validate_attribute("tribe", new.tribe.as_deref())?,
            region: validate_attribute("region", new.region.as_deref())?,
            material: validate_attribute("material", new.material.as_deref())?,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update. Nothing changes unless every field validates.
    pub fn apply_patch(&mut self, patch: ProductPatch, now: DateTime<Utc>) -> DomainResult<()> {
        let name = patch.name.as_deref().map(validate_name).transpose()?;
        let description = patch.description.as_deref().map(validate_description).transpose()?;
        let category = patch.category.as_deref().map(normalize_category).transpose()?;
        let price = patch.price.map(validate_price).transpose()?;
        let images = patch.images.as_deref().map(validate_images).transpose()?;
        let tribe = patch
            .tribe
            .as_deref()
            .map(|t| validate_attribute("tribe", Some(t)))
            .transpose()?;
        let region = patch
            .region
            .as_deref()
            .map(|r| validate_attribute("region", Some(r)))
            .transpose()?;
        let material = patch
            .material
            .as_deref()
            .map(|m| validate_attribute("material", Some(m)))
            .transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(category) = category {
            self.category = category;
        }
        if let Some(price) = price {
            self.price = price;
        }
        if let Some(stock) = patch.stock {
            self.stock = stock;
        }
        if let Some(images) = images {
            self.images = images;
        }
        if let Some(tribe) = tribe {
            self.tribe = tribe;
        }
        if let Some(region) = region {
            self.region = region;
        }
        if let Some(material) = material {
            self.material = material;
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Active and in stock.
    pub fn is_purchasable(&self) -> bool {
        self.is_active && self.stock > 0
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.seller_id == user_id
    }

    /// Only the owning seller or an admin may modify a listing.
    pub fn ensure_manageable_by(&self, principal: &Principal) -> DomainResult<()> {
        if principal.owns_or_admin(self.seller_id) {
            Ok(())
        } else {
            Err(DomainError::forbidden("only the owning seller may modify this product"))
        }
    }

    /// Inactive listings are hidden from everyone but their owner and admins.
    pub fn is_visible_to(&self, viewer: Option<&Principal>) -> bool {
        self.is_active || viewer.is_some_and(|p| p.owns_or_admin(self.seller_id))
    }

    pub fn soft_delete(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::conflict("product is already inactive"));
        }
        self.is_active = false;
        self.updated_at = now;
        Ok(())
    }

    /// Case-insensitive substring match over the searchable text fields.
    ///
    /// `needle` must already be lowercase.
    pub fn matches_text(&self, needle: &str) -> bool {
        let hit = |s: &str| s.to_lowercase().contains(needle);
        hit(&self.name)
            || hit(&self.description)
            || hit(&self.category)
            || self.tribe.as_deref().is_some_and(hit)
    }
}
