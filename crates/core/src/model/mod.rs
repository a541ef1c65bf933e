//! Domain entities: users, products, galleries, orders and comments.
//!
//! These types carry the validated shape of each entity and the rules that
//! belong to it (derived product metrics, order status transitions, checkout
//! planning, comment threading). Persistence is the API crate's concern.

pub mod comment;
pub mod gallery;
pub mod order;
pub mod product;
pub mod user;

use thiserror::Error;

use crate::types::ContactError;

pub use comment::{Comment, CommentContent, CommentThread, build_threads};
pub use gallery::{Gallery, GalleryEntry, GalleryRemoval, MAX_GALLERY_IMAGES, ProductImage};
pub use order::{
    CheckoutError, InvalidTransition, Order, OrderDraft, OrderItem, ShippingAddress,
    plan_checkout,
};
pub use product::{
    LOW_STOCK_THRESHOLD, NewProduct, Product, ProductMetrics, ProductUpdate, Sku,
};
pub use user::{
    CustomerProfile, DayHours, SocialLinks, StoreProfile, User, UserKind, UserProfile,
    WorkingHours, validate_birthday,
};

/// Input that fails an entity's field rules.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A phone, email, post code or name is malformed.
    #[error(transparent)]
    Contact(#[from] ContactError),

    /// Any other field rule.
    #[error("invalid {field}: {reason}")]
    Field {
        /// Offending field.
        field: &'static str,
        /// Rule that was violated.
        reason: String,
    },
}

impl ValidationError {
    /// A rule violation on `field`.
    #[must_use]
    pub fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Field {
            field,
            reason: reason.into(),
        }
    }
}

/// Trim `value` and check its length in characters is within `min..=max`.
pub(crate) fn bounded_text(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<String, ValidationError> {
    let value = value.trim();
    let len = value.chars().count();
    if len < min {
        return Err(if min == 1 {
            ValidationError::field(field, "must not be empty")
        } else {
            ValidationError::field(field, format!("must be at least {min} characters"))
        });
    }
    if len > max {
        return Err(ValidationError::field(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(value.to_owned())
}
