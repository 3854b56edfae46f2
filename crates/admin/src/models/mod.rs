//! Domain models for admin.
//!
//! Rows from the shared database decoded with `sqlx::FromRow`, plus the
//! admin identity kept in the session.

pub mod admin_user;
pub mod catalog;
pub mod customer;
pub mod membership;
pub mod order;
pub mod session;

pub use admin_user::{AdminRole, AdminUser};
pub use catalog::{Category, LowStockProduct, Product};
pub use customer::{Customer, CustomerListItem, Subscription};
pub use membership::{Lesson, MembershipModule};
pub use order::{Order, OrderItem, OrderListItem, Payment, StatusHistoryEntry};
pub use session::{CurrentAdmin, keys as session_keys};
