use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use tribal_auth::Principal;
use tribal_core::UserId;

use crate::app::errors::ApiError;

/// Authenticated caller for a request.
///
/// Inserted by [`crate::middleware::auth_middleware`] when the bearer token is
/// valid and belongs to an active account. Extracting it on a request without
/// one rejects with 401; use `Option<PrincipalContext>` for routes where auth
/// is optional.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> Principal {
        self.principal
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for PrincipalContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<PrincipalContext>()
            .copied()
            .ok_or_else(|| ApiError::unauthorized("authentication required"))
    }
}
