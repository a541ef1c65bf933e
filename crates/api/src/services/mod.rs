//! Business logic services for the marketplace API.
//!
//! # Services
//!
//! - `auth` - Registration and phone + password login

pub mod auth;
