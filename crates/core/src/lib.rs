//! Solenne Core - Shared domain library.
//!
//! This crate provides the types and business rules used across all Solenne
//! components:
//! - `storefront` - Public catalog, cart, checkout, blog and membership area
//! - `admin` - Internal back-office (orders, products, customers, analytics)
//! - `cli` - Migrations, seeding and admin management
//!
//! # Architecture
//!
//! The core crate contains types and pure functions - no HTTP clients and,
//! outside the `postgres` feature, no I/O. Everything but `fulfilment`
//! can be unit tested without a database.
//!
//! # Modules
//!
//! - [`types`] - IDs, emails, slugs, money and status enums
//! - [`cart`] - Session cart arithmetic and shipping rules
//! - [`order`] - Order numbers and checkout contact validation
//! - [`membership`] - Lesson access decisions and subscription periods
//! - [`settings`] - Store configuration edited in the back-office
//! - `fulfilment` - Stock, history and membership effects of order
//!   status changes (`postgres` feature)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
#[cfg(feature = "postgres")]
pub mod fulfilment;
pub mod membership;
pub mod order;
pub mod settings;
pub mod types;

pub use types::*;
