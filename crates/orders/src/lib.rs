//! Ordering domain: carts, checkout, orders and dashboard summaries.

pub mod cart;
pub mod checkout;
pub mod dashboard;
pub mod order;

pub use cart::{Cart, CartLine, MAX_CART_LINES, MAX_LINE_QUANTITY};
pub use checkout::{plan_checkout, PricingPolicy};
pub use dashboard::{AdminDashboard, BuyerDashboard, LowStockItem, OrderSummary, RoleCounts, SellerDashboard, StatusCounts};
pub use order::{Order, OrderLine, OrderScope, OrderStatus, PaymentMethod, ShippingAddress};
