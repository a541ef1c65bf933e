//! Errors raised by aggregate operations.

use thiserror::Error;

/// A value handed to an aggregate operation is outside its domain.
///
/// Operations check their input before touching any state, so a returned
/// error always means nothing was mutated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// A rating, amount, quantity, image or gallery size is outside its
    /// accepted range.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Name of the offending input.
        field: &'static str,
        /// Human-readable constraint that was violated.
        reason: String,
    },
}

impl AggregateError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
