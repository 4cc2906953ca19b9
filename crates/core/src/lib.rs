//! Marketstall Core - Shared domain types and rules.
//!
//! This crate provides common types used across all Marketstall components:
//! - `storefront` - Public-facing shop API (catalog, cart, checkout, orders)
//! - `admin` - Back-office API (products, inventory, orders, users)
//! - `cli` - Command-line tools for migrations, seeding and admin bootstrap
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no database access,
//! no HTTP clients. Anything that decides whether a write is allowed (field
//! validation, cart quantity merging, checkout planning, order status
//! transitions) lives here so both binaries enforce it identically.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, money, quantities and statuses
//! - [`validation`] - Field-level validation of incoming drafts
//! - [`cart`] - Cart quantity rules and totals
//! - [`checkout`] - Order planning (stock, price drift, totals)
//! - [`env`] - Environment variable and secret checks for config loading
//! - [`pagination`] - Page parameters and paginated responses
//! - [`password`] - Argon2 password hashing
//! - [`search`] - `LIKE` pattern escaping

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod env;
pub mod pagination;
pub mod password;
pub mod search;
pub mod types;
pub mod validation;

pub use pagination::{Page, Paginated};
pub use types::*;
