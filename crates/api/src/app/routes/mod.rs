use axum::Router;

pub mod admin;
pub mod auth;
pub mod cart;
pub mod chat;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod system;
pub mod users;
pub mod wishlist;

/// Router for everything under `/api`. Handlers decide whether a caller must be authenticated.
pub fn router() -> Router {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/admin", admin::router())
        .nest("/products", products::router())
        .nest("/reviews", reviews::router())
        .nest("/wishlist", wishlist::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/dashboard", dashboard::router())
        .nest("/chat", chat::router())
}
