//! Authentication error types.

use thiserror::Error;

use marketplace_core::{ContactError, ValidationError};

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A registration field is malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Invalid credentials (wrong password or unknown phone).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Phone or email already registered.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// The account is inactive or banned.
    #[error("account disabled")]
    AccountDisabled,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl From<ContactError> for AuthError {
    fn from(err: ContactError) -> Self {
        Self::Validation(err.into())
    }
}
