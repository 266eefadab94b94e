use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use tribal_auth::{JwtValidator, Principal};
use tribal_infra::{Store, UserRepository};

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub store: Arc<dyn Store>,
}

/// Resolve the bearer token (if any) into a [`PrincipalContext`].
///
/// Requests without a usable token pass through anonymously; protected
/// handlers reject them when they extract the context. The role is read from
/// the stored account so role changes and deactivation apply immediately.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = extract_bearer(req.headers()) {
        match state.jwt.validate(token, Utc::now()) {
            Ok(claims) => match state.store.get_user(claims.sub).await? {
                Some(user) if user.is_active => {
                    req.extensions_mut()
                        .insert(PrincipalContext::new(Principal::new(user.id, user.role)));
                }
                Some(_) => tracing::debug!(user_id = %claims.sub, "token belongs to a deactivated account"),
                None => tracing::debug!(user_id = %claims.sub, "token subject no longer exists"),
            },
            Err(e) => tracing::debug!(error = %e, "ignoring invalid bearer token"),
        }
    }

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let token = header.to_str().ok()?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
