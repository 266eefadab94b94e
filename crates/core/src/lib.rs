//! `tribal-core` — shared domain building blocks for the marketplace.
//!
//! Pure domain primitives only (no storage, no HTTP).

pub mod address;
pub mod entity;
pub mod error;
pub mod id;
pub mod page;
pub mod value_object;

pub use address::{validate_phone, Address};
pub use entity::Entity;
pub use error::{optional_text, required_text, DomainError, DomainResult};
pub use id::{MessageId, OrderId, ProductId, ReviewId, UserId};
pub use page::{Page, PageRequest};
pub use value_object::{Money, ValueObject};
