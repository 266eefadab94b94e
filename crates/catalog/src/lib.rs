//! Catalog domain: products, browse queries, reviews and wishlists.
//!
//! Pure, deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;
pub mod query;
pub mod review;
pub mod wishlist;

pub use product::{NewProduct, Product, ProductPatch};
pub use query::{ProductQuery, ProductSort};
pub use review::{NewReview, RatingSummary, Review};
pub use wishlist::{Wishlist, WishlistEntry, MAX_WISHLIST_ENTRIES};
