use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier.
///
/// Permissions are opaque dotted strings (e.g. "products.manage"). The
/// wildcard `"*"` grants everything and is only handed to admins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const WILDCARD: Permission = Permission::from_static("*");

pub const CART_MANAGE: Permission = Permission::from_static("cart.manage");
pub const WISHLIST_MANAGE: Permission = Permission::from_static("wishlist.manage");
pub const ORDERS_PLACE: Permission = Permission::from_static("orders.place");
pub const ORDERS_CANCEL: Permission = Permission::from_static("orders.cancel");
pub const ORDERS_PAY: Permission = Permission::from_static("orders.pay");
pub const ORDERS_FULFIL: Permission = Permission::from_static("orders.fulfil");
pub const REVIEWS_WRITE: Permission = Permission::from_static("reviews.write");
pub const PRODUCTS_MANAGE: Permission = Permission::from_static("products.manage");
pub const USERS_ADMIN: Permission = Permission::from_static("users.admin");
pub const CHAT_USE: Permission = Permission::from_static("chat.use");
pub const DASHBOARD_BUYER: Permission = Permission::from_static("dashboard.buyer");
pub const DASHBOARD_SELLER: Permission = Permission::from_static("dashboard.seller");
pub const DASHBOARD_ADMIN: Permission = Permission::from_static("dashboard.admin");

/// Static role→permission policy.
pub fn permissions_for(role: Role) -> Vec<Permission> {
    match role {
        Role::Buyer => vec![
            CART_MANAGE,
            WISHLIST_MANAGE,
            ORDERS_PLACE,
            ORDERS_CANCEL,
            ORDERS_PAY,
            REVIEWS_WRITE,
            DASHBOARD_BUYER,
            CHAT_USE,
        ],
        Role::Seller => vec![PRODUCTS_MANAGE, ORDERS_FULFIL, DASHBOARD_SELLER, CHAT_USE],
        Role::Admin => vec![WILDCARD],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sellers_cannot_shop() {
        let perms = permissions_for(Role::Seller);
        assert!(perms.contains(&PRODUCTS_MANAGE));
        assert!(!perms.contains(&CART_MANAGE));
        assert!(!perms.contains(&ORDERS_PLACE));
    }

    #[test]
    fn only_admin_gets_wildcard() {
        assert!(permissions_for(Role::Admin).iter().any(Permission::is_wildcard));
        assert!(!permissions_for(Role::Buyer).iter().any(Permission::is_wildcard));
        assert!(!permissions_for(Role::Seller).iter().any(Permission::is_wildcard));
    }
}
