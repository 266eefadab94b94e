//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, token codecs, pricing and chat hub
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses
//! - `extract.rs`: body/query extractors that reject with `ApiError`
//! - `chat.rs`: in-process chat relay

use std::sync::Arc;

use axum::{http::HeaderValue, routing::get, Extension, Router};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware;

pub mod chat;
pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the black-box tests).
///
/// `cors_origin` of `None` allows any origin.
pub fn build_app(services: Arc<AppServices>, cors_origin: Option<HeaderValue>) -> Router {
    let auth_state = middleware::AuthState {
        jwt: services.jwt.clone(),
        store: services.store.clone(),
    };

    let api = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors_origin)),
        )
}

fn cors_layer(origin: Option<HeaderValue>) -> CorsLayer {
    let origin = match origin {
        Some(origin) => AllowOrigin::exact(origin),
        None => AllowOrigin::from(Any),
    };
    CorsLayer::new().allow_origin(origin).allow_methods(Any).allow_headers(Any)
}
