//! Solenne back-office.
//!
//! Orders, catalog, customers, membership curriculum, CMS content,
//! analytics and store settings, behind password login with roles.
//!
//! # Security
//!
//! This crate holds privileged access: the shared database with write
//! rights, the CMS write token and admin account management. Deploy it on a
//! private network, separate from the storefront.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod analytics;
pub mod cms;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
