//! In-memory store for tests and local development.
//!
//! Every table sits behind one `RwLock`, so operations that touch several
//! tables (checkout, cancellation) are atomic with respect to each other.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use tribal_auth::{Role, User};
use tribal_catalog::{Product, ProductQuery, Review, Wishlist};
use tribal_core::{Entity, OrderId, Page, PageRequest, ProductId, ReviewId, UserId};
use tribal_orders::{Cart, Order, OrderScope, OrderStatus};

use crate::repository::{
    CartRepository, Mutation, OrderRepository, ProductRepository, ReviewRepository, UserRepository, WishlistRepository,
};
use crate::{RepoResult, RepositoryError};

/// Entities keyed by their identity.
#[derive(Debug)]
struct Table<E: Entity> {
    rows: HashMap<E::Id, E>,
}

impl<E: Entity + Clone> Table<E> {
    fn get(&self, id: E::Id) -> Option<E> {
        self.rows.get(&id).cloned()
    }

    fn get_mut(&mut self, id: E::Id) -> Option<&mut E> {
        self.rows.get_mut(&id)
    }

    fn insert(&mut self, row: E) {
        self.rows.insert(row.id(), row);
    }

    /// Run `change` on a copy of the row and store the copy only if it succeeds.
    fn modify(&mut self, id: E::Id, change: Mutation<'_, E>, what: &'static str) -> RepoResult<E> {
        let slot = self.rows.get_mut(&id).ok_or(RepositoryError::NotFound(what))?;
        let mut next = slot.clone();
        change(&mut next)?;
        *slot = next.clone();
        Ok(next)
    }

    fn remove(&mut self, id: E::Id) -> Option<E> {
        self.rows.remove(&id)
    }

    fn iter(&self) -> impl Iterator<Item = &E> {
        self.rows.values()
    }
}

impl<E: Entity> Default for Table<E> {
    fn default() -> Self {
        Self { rows: HashMap::new() }
    }
}

#[derive(Debug, Default)]
struct Tables {
    users: Table<User>,
    products: Table<Product>,
    orders: Table<Order>,
    reviews: Table<Review>,
    carts: HashMap<UserId, Cart>,
    wishlists: HashMap<UserId, Wishlist>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepoResult<RwLockReadGuard<'_, Tables>> {
        self.inner.read().map_err(|_| RepositoryError::Poisoned)
    }

    fn write(&self) -> RepoResult<RwLockWriteGuard<'_, Tables>> {
        self.inner.write().map_err(|_| RepositoryError::Poisoned)
    }
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert_user(&self, user: &User) -> RepoResult<()> {
        let mut t = self.write()?;
        if t.users.iter().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict("email is already registered".into()));
        }
        t.users.insert(user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        Ok(self.read()?.users.get(id))
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self.read()?.users.iter().find(|u| u.email == email).cloned())
    }

    async fn modify_user(&self, id: UserId, change: Mutation<'_, User>) -> RepoResult<User> {
        let mut t = self.write()?;
        let mut user = t.users.get(id).ok_or(RepositoryError::NotFound("user"))?;
        change(&mut user)?;
        if t.users.iter().any(|u| u.email == user.email && u.id != id) {
            return Err(RepositoryError::Conflict("email is already registered".into()));
        }
        t.users.insert(user.clone());
        Ok(user)
    }

    async fn list_users(&self, role: Option<Role>, page: PageRequest) -> RepoResult<Page<User>> {
        let t = self.read()?;
        let mut users: Vec<User> = t
            .users
            .iter()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(page.paginate(users))
    }

    async fn all_users(&self) -> RepoResult<Vec<User>> {
        Ok(self.read()?.users.iter().cloned().collect())
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn insert_product(&self, product: &Product) -> RepoResult<()> {
        self.write()?.products.insert(product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> RepoResult<Option<Product>> {
        Ok(self.read()?.products.get(id))
    }

    async fn get_products(&self, ids: &[ProductId]) -> RepoResult<Vec<Product>> {
        let t = self.read()?;
        Ok(ids.iter().filter_map(|id| t.products.get(*id)).collect())
    }

    async fn modify_product(&self, id: ProductId, change: Mutation<'_, Product>) -> RepoResult<Product> {
        self.write()?.products.modify(id, change, "product")
    }

    async fn search_products(&self, query: &ProductQuery, page: PageRequest) -> RepoResult<Page<Product>> {
        let t = self.read()?;
        Ok(query.apply(t.products.iter().cloned(), page))
    }

    async fn categories(&self) -> RepoResult<Vec<String>> {
        let t = self.read()?;
        let mut categories: Vec<String> = t
            .products
            .iter()
            .filter(|p| p.is_active)
            .map(|p| p.category.clone())
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    async fn products_by_seller(&self, seller_id: UserId) -> RepoResult<Vec<Product>> {
        let t = self.read()?;
        Ok(t.products.iter().filter(|p| p.seller_id == seller_id).cloned().collect())
    }

    async fn all_products(&self) -> RepoResult<Vec<Product>> {
        Ok(self.read()?.products.iter().cloned().collect())
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn get_cart(&self, buyer_id: UserId) -> RepoResult<Option<Cart>> {
        Ok(self.read()?.carts.get(&buyer_id).cloned())
    }

    async fn modify_cart(&self, buyer_id: UserId, change: Mutation<'_, Cart>) -> RepoResult<Cart> {
        let mut t = self.write()?;
        let mut cart = t
            .carts
            .get(&buyer_id)
            .cloned()
            .unwrap_or_else(|| Cart::new(buyer_id, Utc::now()));
        change(&mut cart)?;
        t.carts.insert(buyer_id, cart.clone());
        Ok(cart)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn place_order(&self, order: &Order) -> RepoResult<()> {
        let mut t = self.write()?;

        for line in &order.lines {
            let available = t
                .products
                .get(line.product_id)
                .filter(|p| p.is_active)
                .map(|p| p.stock)
                .unwrap_or(0);
            if available < line.quantity {
                return Err(RepositoryError::Conflict(format!("insufficient stock for '{}'", line.name)));
            }
        }
        for line in &order.lines {
            if let Some(product) = t.products.get_mut(line.product_id) {
                product.stock -= line.quantity;
                product.updated_at = order.created_at;
            }
        }
        t.orders.insert(order.clone());
        if let Some(cart) = t.carts.get_mut(&order.buyer_id) {
            cart.remove_products(&order.product_ids(), order.created_at);
        }
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> RepoResult<Option<Order>> {
        Ok(self.read()?.orders.get(id))
    }

    async fn list_orders(
        &self,
        scope: OrderScope,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Order>> {
        let t = self.read()?;
        let mut orders: Vec<Order> = t
            .orders
            .iter()
            .filter(|o| scope.matches(o) && status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(page.paginate(orders))
    }

    async fn orders_for(&self, scope: OrderScope) -> RepoResult<Vec<Order>> {
        let t = self.read()?;
        let mut orders: Vec<Order> = t.orders.iter().filter(|o| scope.matches(o)).cloned().collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn update_order(&self, order: &Order, expected: OrderStatus) -> RepoResult<()> {
        let mut t = self.write()?;
        let stored = t.orders.get_mut(order.id).ok_or(RepositoryError::NotFound("order"))?;
        if stored.status != expected {
            return Err(RepositoryError::Conflict("order was modified concurrently".into()));
        }
        *stored = order.clone();
        Ok(())
    }

    async fn cancel_order(&self, order: &Order, expected: OrderStatus) -> RepoResult<()> {
        let mut t = self.write()?;
        let stored = t.orders.get_mut(order.id).ok_or(RepositoryError::NotFound("order"))?;
        if stored.status != expected {
            return Err(RepositoryError::Conflict("order was modified concurrently".into()));
        }
        *stored = order.clone();
        for line in &order.lines {
            if let Some(product) = t.products.get_mut(line.product_id) {
                product.stock = product.stock.saturating_add(line.quantity);
                product.updated_at = order.updated_at;
            }
        }
        Ok(())
    }

    async fn has_delivered_purchase(&self, buyer_id: UserId, product_id: ProductId) -> RepoResult<bool> {
        let t = self.read()?;
        Ok(t.orders.iter().any(|o| {
            o.buyer_id == buyer_id
                && o.status == OrderStatus::Delivered
                && o.lines.iter().any(|l| l.product_id == product_id)
        }))
    }
}

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn insert_review(&self, review: &Review) -> RepoResult<()> {
        let mut t = self.write()?;
        if t
            .reviews
            .iter()
            .any(|r| r.product_id == review.product_id && r.user_id == review.user_id)
        {
            return Err(RepositoryError::Conflict("you have already reviewed this product".into()));
        }
        t.reviews.insert(review.clone());
        Ok(())
    }

    async fn get_review(&self, id: ReviewId) -> RepoResult<Option<Review>> {
        Ok(self.read()?.reviews.get(id))
    }

    async fn delete_review(&self, id: ReviewId) -> RepoResult<()> {
        self.write()?
            .reviews
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound("review"))
    }

    async fn reviews_for_product(&self, product_id: ProductId) -> RepoResult<Vec<Review>> {
        let t = self.read()?;
        let mut reviews: Vec<Review> = t
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(reviews)
    }
}

#[async_trait]
impl WishlistRepository for MemoryStore {
    async fn get_wishlist(&self, user_id: UserId) -> RepoResult<Wishlist> {
        Ok(self
            .read()?
            .wishlists
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| Wishlist::new(user_id)))
    }

    async fn modify_wishlist(&self, user_id: UserId, change: Mutation<'_, Wishlist>) -> RepoResult<Wishlist> {
        let mut t = self.write()?;
        if t.users.get(user_id).is_none() {
            return Err(RepositoryError::NotFound("user"));
        }
        let mut wishlist = t
            .wishlists
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| Wishlist::new(user_id));
        change(&mut wishlist)?;
        t.wishlists.insert(user_id, wishlist.clone());
        Ok(wishlist)
    }
}
