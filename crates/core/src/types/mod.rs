//! Core value types for the marketplace.
//!
//! Type-safe wrappers for IDs, contact details and status enums.

pub mod contact;
pub mod id;
pub mod status;

pub use contact::{ContactError, Email, PersonName, Phone, PostCode};
pub use id::*;
pub use status::*;
