//! Core types for Solenne.
//!
//! Type-safe wrappers for the domain concepts shared by the storefront,
//! the back-office and the CLI.

pub mod email;
pub mod id;
pub mod money;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, Money, MoneyError};
pub use slug::{Slug, SlugError};
pub use status::*;
