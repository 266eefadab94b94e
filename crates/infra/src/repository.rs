//! Storage ports.
//!
//! One trait per record type; [`Store`] bundles them so the API layer can
//! hold a single `Arc<dyn Store>`. Lookups by unknown id return `Ok(None)`;
//! updates and deletes of unknown records return [`crate::RepositoryError::NotFound`].
//!
//! Edits go through `modify_*`: the store hands the current record to a
//! [`Mutation`] while holding it exclusively and persists the result, so a
//! write never starts from a stale read.

use async_trait::async_trait;

use tribal_auth::{Role, User};
use tribal_catalog::{Product, ProductQuery, Review, Wishlist};
use tribal_core::{DomainResult, OrderId, Page, PageRequest, ProductId, ReviewId, UserId};
use tribal_orders::{Cart, Order, OrderScope, OrderStatus};

use crate::RepoResult;

/// Edit applied to a stored record. An error aborts the write and surfaces as
/// [`crate::RepositoryError::Domain`].
pub type Mutation<'a, T> = Box<dyn FnOnce(&mut T) -> DomainResult<()> + Send + 'a>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with [`crate::RepositoryError::Conflict`] when the email is taken.
    async fn insert_user(&self, user: &User) -> RepoResult<()>;
    async fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// `email` must already be normalised.
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Fails with [`crate::RepositoryError::Conflict`] when the edit takes
    /// another account's email.
    async fn modify_user(&self, id: UserId, change: Mutation<'_, User>) -> RepoResult<User>;
    /// Oldest accounts first.
    async fn list_users(&self, role: Option<Role>, page: PageRequest) -> RepoResult<Page<User>>;
    async fn all_users(&self) -> RepoResult<Vec<User>>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn insert_product(&self, product: &Product) -> RepoResult<()>;
    async fn get_product(&self, id: ProductId) -> RepoResult<Option<Product>>;
    /// Unknown ids are skipped.
    async fn get_products(&self, ids: &[ProductId]) -> RepoResult<Vec<Product>>;
    async fn modify_product(&self, id: ProductId, change: Mutation<'_, Product>) -> RepoResult<Product>;
    async fn search_products(&self, query: &ProductQuery, page: PageRequest) -> RepoResult<Page<Product>>;
    /// Distinct categories of active products, sorted.
    async fn categories(&self) -> RepoResult<Vec<String>>;
    async fn products_by_seller(&self, seller_id: UserId) -> RepoResult<Vec<Product>>;
    async fn all_products(&self) -> RepoResult<Vec<Product>>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn get_cart(&self, buyer_id: UserId) -> RepoResult<Option<Cart>>;
    /// A buyer without a stored cart starts from an empty one.
    async fn modify_cart(&self, buyer_id: UserId, change: Mutation<'_, Cart>) -> RepoResult<Cart>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Commit a checkout in one step: reserve stock for every line (only if
    /// enough remains), insert the order and drop the ordered products from
    /// the buyer's cart.
    ///
    /// A line whose stock ran out since planning yields
    /// [`crate::RepositoryError::Conflict`] and nothing is written.
    async fn place_order(&self, order: &Order) -> RepoResult<()>;
    async fn get_order(&self, id: OrderId) -> RepoResult<Option<Order>>;
    /// Newest first.
    async fn list_orders(
        &self,
        scope: OrderScope,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Order>>;
    async fn orders_for(&self, scope: OrderScope) -> RepoResult<Vec<Order>>;
    /// Persist status and payment fields, provided the stored status is
    /// still `expected`; otherwise [`crate::RepositoryError::Conflict`].
    async fn update_order(&self, order: &Order, expected: OrderStatus) -> RepoResult<()>;
    /// Persist a cancelled order and return its units to stock together.
    async fn cancel_order(&self, order: &Order, expected: OrderStatus) -> RepoResult<()>;
    /// The buyer has a delivered order containing the product.
    async fn has_delivered_purchase(&self, buyer_id: UserId, product_id: ProductId) -> RepoResult<bool>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Fails with [`crate::RepositoryError::Conflict`] on a second review of the
    /// same product by the same user.
    async fn insert_review(&self, review: &Review) -> RepoResult<()>;
    async fn get_review(&self, id: ReviewId) -> RepoResult<Option<Review>>;
    async fn delete_review(&self, id: ReviewId) -> RepoResult<()>;
    /// Newest first.
    async fn reviews_for_product(&self, product_id: ProductId) -> RepoResult<Vec<Review>>;
}

#[async_trait]
pub trait WishlistRepository: Send + Sync {
    /// Never `None`: a user without saved products has an empty wishlist.
    async fn get_wishlist(&self, user_id: UserId) -> RepoResult<Wishlist>;
    /// Fails with [`crate::RepositoryError::NotFound`] for an unknown user.
    async fn modify_wishlist(&self, user_id: UserId, change: Mutation<'_, Wishlist>) -> RepoResult<Wishlist>;
}

/// Every repository the application needs.
pub trait Store:
    UserRepository + ProductRepository + CartRepository + OrderRepository + ReviewRepository + WishlistRepository
{
}

impl<T> Store for T where
    T: UserRepository + ProductRepository + CartRepository + OrderRepository + ReviewRepository + WishlistRepository
{
}
