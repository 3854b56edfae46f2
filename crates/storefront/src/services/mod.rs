//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Customer registration and password login
//! - `email` - Transactional email (order confirmation, welcome, membership)
//! - `settings` - Cached store settings

pub mod auth;
pub mod email;
pub mod settings;
