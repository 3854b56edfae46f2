//! Domain models for the storefront.
//!
//! Rows are decoded straight into these types with `sqlx::FromRow`; the
//! core newtypes (`ProductId`, `CurrencyCode`, `OrderStatus`, ...) carry
//! their own Postgres encodings.

pub mod catalog;
pub mod customer;
pub mod membership;
pub mod order;
pub mod session;

pub use catalog::{Category, Product};
pub use customer::Customer;
pub use membership::{Lesson, MembershipModule, Subscription};
pub use order::{Order, OrderItem, OrderSummary};
pub use session::{CurrentCustomer, keys as session_keys};
