//! Marketplace Core - domain types and aggregation logic.
//!
//! This crate provides the types and rules shared by every marketplace
//! component:
//! - `marketplace-api` - JSON REST API
//! - `marketplace-cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure operations - no I/O, no
//! database access, no HTTP. Each operation takes the current state of an
//! entity and returns (or writes into) the next state; the caller decides when
//! and how it is persisted.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, contact values and status enums
//! - [`aggregate`] - Rating averages, counters, cart/wishlist collections and
//!   image slots
//! - [`model`] - Users, products, orders and comments
//!
//! # Features
//!
//! - `postgres` - `sqlx` encode/decode for IDs, contact values and enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod aggregate;
pub mod model;
pub mod types;

pub use aggregate::AggregateError;
pub use model::ValidationError;
pub use types::*;
