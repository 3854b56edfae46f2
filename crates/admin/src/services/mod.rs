//! Business logic services for admin.
//!
//! # Services
//!
//! - `auth` - Password login and admin account creation
//! - `email` - Order status notifications to customers

pub mod auth;
pub mod email;

pub use auth::{AdminAuthError, AdminAuthService};
pub use email::{EmailError, EmailService};
