//! Store behaviour shared by both adapters.
//!
//! Scenarios take `&dyn Store` and run against [`MemoryStore`] always, and
//! against Postgres when `TEST_DATABASE_URL` points at a scratch database.

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use secrecy::SecretString;

    use tribal_auth::{NewUser, ProfilePatch, Role, User};
    use tribal_catalog::{NewProduct, NewReview, Product, ProductPatch, ProductQuery, Review, Wishlist};
    use tribal_core::{Address, DomainError, Money, PageRequest, ProductId};
    use tribal_orders::{plan_checkout, Cart, OrderScope, OrderStatus, PaymentMethod, PricingPolicy, ShippingAddress};

    use crate::{
        CartRepository, MemoryStore, OrderRepository, PostgresStore, ProductRepository, RepositoryError,
        ReviewRepository, Store, UserRepository, WishlistRepository,
    };

    fn user(role: Role) -> User {
        let suffix = uuid::Uuid::now_v7().simple().to_string();
        let new = NewUser {
            name: format!("{role} user"),
            email: format!("{role}-{suffix}@example.in"),
            role,
            phone: None,
        };
        User::register(new, "hash".into(), Utc::now()).unwrap()
    }

    fn product(seller: &User, stock: u32) -> Product {
        let new = NewProduct {
            name: "Dhokra Elephant".into(),
            description: "Lost-wax brass casting".into(),
            category: "metalwork".into(),
            price: Money::from_paise(30_000),
            stock,
            images: vec![],
            tribe: Some("Dhokra".into()),
            region: None,
            material: Some("brass".into()),
        };
        Product::create(seller.id, new, Utc::now()).unwrap()
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Kiran Munda".into(),
            phone: "9876543210".into(),
            address: Address {
                line1: "Ward 7".into(),
                line2: None,
                city: "Khunti".into(),
                state: "Jharkhand".into(),
                postal_code: "835210".into(),
                country: "India".into(),
            },
        }
    }

    async fn seed(store: &dyn Store, stock: u32) -> (User, User, Product) {
        let seller = user(Role::Seller);
        let buyer = user(Role::Buyer);
        store.insert_user(&seller).await.unwrap();
        store.insert_user(&buyer).await.unwrap();
        let p = product(&seller, stock);
        store.insert_product(&p).await.unwrap();
        (seller, buyer, p)
    }

    async fn duplicate_email_conflicts(store: &dyn Store) {
        let u = user(Role::Buyer);
        store.insert_user(&u).await.unwrap();
        let mut twin = user(Role::Buyer);
        twin.email = u.email.clone();
        assert!(matches!(store.insert_user(&twin).await, Err(RepositoryError::Conflict(_))));
        assert_eq!(store.find_user_by_email(&u.email).await.unwrap().unwrap().id, u.id);
    }

    async fn checkout_reserves_stock_and_clears_cart(store: &dyn Store) {
        let (_, buyer, p) = seed(store, 5).await;
        let cart = store
            .modify_cart(buyer.id, Box::new(|c: &mut Cart| c.add(&p, 3, Utc::now())))
            .await
            .unwrap();

        let order = plan_checkout(
            buyer.id,
            &cart,
            std::slice::from_ref(&p),
            &address(),
            PaymentMethod::Upi,
            &PricingPolicy::default(),
            Utc::now(),
        )
        .unwrap();
        store.place_order(&order).await.unwrap();

        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock, 2);
        assert!(store.get_cart(buyer.id).await.unwrap().unwrap().is_empty());
        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.lines, order.lines);
        assert_eq!(stored.total, order.total);

        // A second order planned against the stale product snapshot loses the race.
        let mut again = Cart::new(buyer.id, Utc::now());
        again.add(&p, 3, Utc::now()).unwrap();
        let stale = plan_checkout(
            buyer.id,
            &again,
            &[p.clone()],
            &address(),
            PaymentMethod::Card,
            &PricingPolicy::default(),
            Utc::now(),
        )
        .unwrap();
        assert!(matches!(store.place_order(&stale).await, Err(RepositoryError::Conflict(_))));
        assert!(store.get_order(stale.id).await.unwrap().is_none());
        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock, 2);
    }

    async fn cancel_restocks_once(store: &dyn Store) {
        let (seller, buyer, p) = seed(store, 4).await;
        let mut cart = Cart::new(buyer.id, Utc::now());
        cart.add(&p, 4, Utc::now()).unwrap();
        let mut order = plan_checkout(
            buyer.id,
            &cart,
            &[p.clone()],
            &address(),
            PaymentMethod::CashOnDelivery,
            &PricingPolicy::default(),
            Utc::now(),
        )
        .unwrap();
        store.place_order(&order).await.unwrap();
        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock, 0);

        let previous = order.status;
        order.cancel(Utc::now()).unwrap();
        store.cancel_order(&order, previous).await.unwrap();
        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock, 4);

        // Replaying with a stale expected status must not restock twice.
        assert!(matches!(
            store.cancel_order(&order, previous).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock, 4);

        let listed = store
            .list_orders(OrderScope::Seller(seller.id), Some(OrderStatus::Cancelled), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(listed.total, 1);
        assert_eq!(listed.items[0].id, order.id);
    }

    async fn reviews_are_unique_per_author(store: &dyn Store) {
        let (_, buyer, p) = seed(store, 1).await;
        let new = || NewReview {
            rating: 5,
            comment: "Stunning".into(),
        };
        let first = Review::write(p.id, buyer.id, &buyer.name, new(), false, Utc::now()).unwrap();
        store.insert_review(&first).await.unwrap();
        let second = Review::write(p.id, buyer.id, &buyer.name, new(), false, Utc::now()).unwrap();
        assert!(matches!(store.insert_review(&second).await, Err(RepositoryError::Conflict(_))));

        store.delete_review(first.id).await.unwrap();
        assert!(matches!(store.delete_review(first.id).await, Err(RepositoryError::NotFound(_))));
        assert!(!store.has_delivered_purchase(buyer.id, p.id).await.unwrap());
    }

    async fn search_hides_soft_deleted(store: &dyn Store) {
        let (seller, _, p) = seed(store, 2).await;
        let mine = ProductQuery {
            seller_id: Some(seller.id),
            q: Some("dhokra".into()),
            ..Default::default()
        };
        assert_eq!(store.search_products(&mine, PageRequest::default()).await.unwrap().total, 1);

        store
            .modify_product(p.id, Box::new(|p: &mut Product| p.soft_delete(Utc::now())))
            .await
            .unwrap();
        assert_eq!(store.search_products(&mine, PageRequest::default()).await.unwrap().total, 0);

        let owner_view = ProductQuery {
            include_inactive: true,
            ..mine
        };
        assert_eq!(store.search_products(&owner_view, PageRequest::default()).await.unwrap().total, 1);
    }

    fn checkout(buyer: &User, cart: &Cart, products: &[Product]) -> tribal_orders::Order {
        plan_checkout(
            buyer.id,
            cart,
            products,
            &address(),
            PaymentMethod::Upi,
            &PricingPolicy::default(),
            Utc::now(),
        )
        .unwrap()
    }

    async fn stock(store: &dyn Store, id: ProductId) -> u32 {
        store.get_product(id).await.unwrap().unwrap().stock
    }

    async fn failed_checkout_changes_nothing(store: &dyn Store) {
        let (seller, buyer, plenty) = seed(store, 5).await;
        let scarce = product(&seller, 1);
        store.insert_product(&scarce).await.unwrap();
        let cart = store
            .modify_cart(
                buyer.id,
                Box::new(|c: &mut Cart| {
                    c.add(&plenty, 2, Utc::now())?;
                    c.add(&scarce, 1, Utc::now())
                }),
            )
            .await
            .unwrap();
        let order = checkout(&buyer, &cart, &[plenty.clone(), scarce.clone()]);

        // Another buyer takes the last unit between planning and commit.
        let rival = user(Role::Buyer);
        store.insert_user(&rival).await.unwrap();
        let mut rival_cart = Cart::new(rival.id, Utc::now());
        rival_cart.add(&scarce, 1, Utc::now()).unwrap();
        store
            .place_order(&checkout(&rival, &rival_cart, std::slice::from_ref(&scarce)))
            .await
            .unwrap();

        assert!(matches!(store.place_order(&order).await, Err(RepositoryError::Conflict(_))));
        assert!(store.get_order(order.id).await.unwrap().is_none());
        assert_eq!(stock(store, plenty.id).await, 5);
        assert_eq!(stock(store, scarce.id).await, 0);

        let kept = store.get_cart(buyer.id).await.unwrap().unwrap();
        let lines: Vec<_> = kept.lines.iter().map(|l| (l.product_id, l.quantity)).collect();
        assert_eq!(lines, vec![(plenty.id, 2), (scarce.id, 1)]);
    }

    async fn product_edit_keeps_concurrent_sale(store: &dyn Store) {
        let (_, buyer, p) = seed(store, 5).await;
        // The seller opened the edit form before the sale.
        let loaded_by_seller = store.get_product(p.id).await.unwrap().unwrap();

        let mut cart = Cart::new(buyer.id, Utc::now());
        cart.add(&p, 3, Utc::now()).unwrap();
        store.place_order(&checkout(&buyer, &cart, std::slice::from_ref(&p))).await.unwrap();
        assert_eq!(stock(store, p.id).await, 2);

        let reprice = ProductPatch {
            price: Some(Money::from_paise(35_000)),
            ..Default::default()
        };
        let edited = store
            .modify_product(
                loaded_by_seller.id,
                Box::new(move |p: &mut Product| p.apply_patch(reprice, Utc::now())),
            )
            .await
            .unwrap();
        assert_eq!(edited.price, Money::from_paise(35_000));
        assert_eq!(edited.stock, 2);
        assert_eq!(stock(store, p.id).await, 2);

        // A rejected edit writes nothing, not even its valid fields.
        let invalid = ProductPatch {
            name: Some("   ".into()),
            stock: Some(50),
            ..Default::default()
        };
        let result = store
            .modify_product(p.id, Box::new(move |p: &mut Product| p.apply_patch(invalid, Utc::now())))
            .await;
        assert!(matches!(result, Err(RepositoryError::Domain(_))));
        assert_eq!(stock(store, p.id).await, 2);

        let missing = store
            .modify_product(ProductId::new(), Box::new(|_: &mut Product| Ok(())))
            .await;
        assert!(matches!(missing, Err(RepositoryError::NotFound(_))));
    }

    async fn profile_edit_keeps_admin_changes(store: &dyn Store) {
        let u = user(Role::Seller);
        store.insert_user(&u).await.unwrap();
        // The account holder loaded their profile before the admin acted.
        let loaded_by_owner = store.get_user(u.id).await.unwrap().unwrap();

        store
            .modify_user(u.id, Box::new(|u: &mut User| u.deactivate(Utc::now())))
            .await
            .unwrap();
        store
            .modify_user(u.id, Box::new(|u: &mut User| u.change_role(Role::Buyer, Utc::now())))
            .await
            .unwrap();

        let patch = ProfilePatch {
            name: Some("Sunita Gond".into()),
            ..Default::default()
        };
        let saved = store
            .modify_user(
                loaded_by_owner.id,
                Box::new(move |u: &mut User| u.apply_profile(patch, Utc::now())),
            )
            .await
            .unwrap();
        assert_eq!(saved.name, "Sunita Gond");
        assert!(!saved.is_active);
        assert_eq!(saved.role, Role::Buyer);

        store
            .modify_user(
                u.id,
                Box::new(|u: &mut User| {
                    u.set_password_hash("rehashed".into(), Utc::now());
                    Ok(())
                }),
            )
            .await
            .unwrap();
        let stored = store.get_user(u.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "rehashed");
        assert_eq!(stored.name, "Sunita Gond");
        assert!(!stored.is_active);
        assert_eq!(stored.role, Role::Buyer);
    }

    async fn cart_edits_around_checkout(store: &dyn Store) {
        let (seller, buyer, p) = seed(store, 5).await;
        let extra = product(&seller, 5);
        store.insert_product(&extra).await.unwrap();

        let planned = store
            .modify_cart(buyer.id, Box::new(|c: &mut Cart| c.add(&p, 1, Utc::now())))
            .await
            .unwrap();
        let order = checkout(&buyer, &planned, std::slice::from_ref(&p));

        // Added after planning: not part of the order, so it stays in the cart.
        store
            .modify_cart(buyer.id, Box::new(|c: &mut Cart| c.add(&extra, 2, Utc::now())))
            .await
            .unwrap();
        store.place_order(&order).await.unwrap();
        let cart = store.get_cart(buyer.id).await.unwrap().unwrap();
        assert_eq!(cart.product_ids(), vec![extra.id]);

        // Later edits start from the stored cart, so the ordered line stays gone.
        let cart = store
            .modify_cart(buyer.id, Box::new(|c: &mut Cart| c.add(&extra, 1, Utc::now())))
            .await
            .unwrap();
        assert_eq!(cart.product_ids(), vec![extra.id]);
        assert_eq!(cart.line(extra.id).unwrap().quantity, 3);

        // A rejected edit of a buyer with no stored cart leaves none behind.
        let newcomer = user(Role::Buyer);
        store.insert_user(&newcomer).await.unwrap();
        let result = store
            .modify_cart(newcomer.id, Box::new(|c: &mut Cart| c.add(&p, 0, Utc::now())))
            .await;
        assert!(matches!(result, Err(RepositoryError::Domain(_))));
        assert!(store.get_cart(newcomer.id).await.unwrap().is_none());
    }

    async fn wishlist_edits_are_checked(store: &dyn Store) {
        let (_, buyer, p) = seed(store, 1).await;

        let saved = store
            .modify_wishlist(buyer.id, Box::new(|w: &mut Wishlist| w.add(p.id, Utc::now()).map(|_| ())))
            .await
            .unwrap();
        assert_eq!(saved.product_ids(), vec![p.id]);

        let mut added = true;
        store
            .modify_wishlist(
                buyer.id,
                Box::new(|w: &mut Wishlist| {
                    added = w.add(p.id, Utc::now())?;
                    Ok(())
                }),
            )
            .await
            .unwrap();
        assert!(!added);
        assert_eq!(store.get_wishlist(buyer.id).await.unwrap().len(), 1);

        let rejected = store
            .modify_wishlist(
                buyer.id,
                Box::new(|w: &mut Wishlist| {
                    w.remove(p.id);
                    Err(DomainError::conflict("changed my mind"))
                }),
            )
            .await;
        assert!(matches!(rejected, Err(RepositoryError::Domain(_))));
        assert_eq!(store.get_wishlist(buyer.id).await.unwrap().product_ids(), vec![p.id]);

        let stranger = user(Role::Buyer);
        let missing = store
            .modify_wishlist(stranger.id, Box::new(|w: &mut Wishlist| w.add(p.id, Utc::now()).map(|_| ())))
            .await;
        assert!(matches!(missing, Err(RepositoryError::NotFound(_))));
    }

    async fn run_all(store: &dyn Store) {
        duplicate_email_conflicts(store).await;
        checkout_reserves_stock_and_clears_cart(store).await;
        cancel_restocks_once(store).await;
        reviews_are_unique_per_author(store).await;
        search_hides_soft_deleted(store).await;
        failed_checkout_changes_nothing(store).await;
        product_edit_keeps_concurrent_sale(store).await;
        profile_edit_keeps_admin_changes(store).await;
        cart_edits_around_checkout(store).await;
        wishlist_edits_are_checked(store).await;
    }

    #[tokio::test]
    async fn memory_store_behaviour() {
        run_all(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn memory_wishlist_defaults_to_empty() {
        let store = MemoryStore::new();
        let buyer = user(Role::Buyer);
        let wishlist = store.get_wishlist(buyer.id).await.unwrap();
        assert!(wishlist.is_empty());
        assert_eq!(wishlist.user_id, buyer.id);
    }

    #[tokio::test]
    async fn postgres_store_behaviour() {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            return;
        };
        let store = PostgresStore::connect(&SecretString::from(url), 5).await.unwrap();
        run_all(&store).await;
    }
}
