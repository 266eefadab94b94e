//! API-side authorization guard.
//!
//! Checks the role policy at the handler boundary, before any store access,
//! so domain types stay free of HTTP concerns.

use tribal_auth::{authorize, AuthzError, Permission, Principal};

use crate::context::PrincipalContext;

/// Require `permission` for the current caller and hand back its principal.
pub fn require(ctx: PrincipalContext, permission: &Permission) -> Result<Principal, AuthzError> {
    let principal = ctx.principal();
    authorize(&principal, permission)?;
    Ok(principal)
}

#[cfg(test)]
mod tests {
    use tribal_auth::{permissions, Role};
    use tribal_core::UserId;

    use super::*;

    #[test]
    fn sellers_cannot_place_orders() {
        let ctx = PrincipalContext::new(Principal::new(UserId::new(), Role::Seller));
        assert!(require(ctx, &permissions::PRODUCTS_MANAGE).is_ok());
        assert_eq!(
            require(ctx, &permissions::ORDERS_PLACE),
            Err(AuthzError::Forbidden("orders.place".into()))
        );
    }

    #[test]
    fn admin_passes_everything() {
        let ctx = PrincipalContext::new(Principal::new(UserId::new(), Role::Admin));
        assert!(require(ctx, &permissions::DASHBOARD_ADMIN).is_ok());
        assert!(require(ctx, &permissions::CART_MANAGE).is_ok());
    }
}
