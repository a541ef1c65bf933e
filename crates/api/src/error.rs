//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Server errors are captured to
//! Sentry before responding; clients always get a JSON `{"error": "..."}` body
//! without internal details.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use marketplace_core::model::{CheckoutError, InvalidTransition};
use marketplace_core::{AggregateError, ValidationError};

use crate::db::RepositoryError;
use crate::services::auth::AuthError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Request field failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Rating, quantity or other aggregate input out of range.
    #[error("Invalid input: {0}")]
    Aggregate(#[from] AggregateError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body exceeds a configured limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        Self::Database(RepositoryError::Checkout(err))
    }
}

impl From<InvalidTransition> for AppError {
    fn from(err: InvalidTransition) -> Self {
        Self::Database(RepositoryError::Transition(err))
    }
}

impl AppError {
    /// Whether this is a server-side failure worth reporting.
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Internal(_)
                | Self::Database(RepositoryError::Database(_) | RepositoryError::DataCorruption(_))
                | Self::Auth(AuthError::PasswordHash | AuthError::Repository(_))
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
                AuthError::AccountDisabled => StatusCode::FORBIDDEN,
                AuthError::Repository(err) => repository_status(err),
                AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Validation(_) | Self::Aggregate(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Database(err) => repository_message(err),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid phone or password".to_string(),
                AuthError::UserAlreadyExists => {
                    "An account with this phone or email already exists".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::Validation(err) => err.to_string(),
                AuthError::AccountDisabled => "This account is disabled".to_string(),
                AuthError::Repository(err) => repository_message(err),
                AuthError::PasswordHash => "Internal server error".to_string(),
            },
            Self::Validation(err) => err.to_string(),
            Self::Aggregate(err) => err.to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::PayloadTooLarge(msg) => msg.clone(),
            Self::RateLimited => "Too many requests".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) | RepositoryError::Transition(_) => StatusCode::CONFLICT,
        RepositoryError::Aggregate(_) | RepositoryError::Validation(_) => StatusCode::BAD_REQUEST,
        RepositoryError::Checkout(err) => match err {
            CheckoutError::EmptyCart => StatusCode::BAD_REQUEST,
            CheckoutError::ProductNotFound(_) => StatusCode::NOT_FOUND,
            CheckoutError::Unavailable(_) | CheckoutError::InsufficientStock { .. } => {
                StatusCode::CONFLICT
            }
        },
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn repository_message(err: &RepositoryError) -> String {
    match err {
        RepositoryError::NotFound => "Not found".to_string(),
        RepositoryError::Conflict(msg) => msg.clone(),
        RepositoryError::Aggregate(err) => err.to_string(),
        RepositoryError::Validation(err) => err.to_string(),
        RepositoryError::Checkout(err) => err.to_string(),
        RepositoryError::Transition(err) => err.to_string(),
        // Don't expose internal error details to clients
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            "Internal server error".to_string()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added product", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use marketplace_core::ProductId;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product".to_string());
        assert_eq!(err.to_string(), "Not found: product");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::PayloadTooLarge("test".to_string())),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_mapping() {
        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(RepositoryError::Conflict("dup".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::DataCorruption("bad".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_checkout_mapping() {
        assert_eq!(
            get_status(CheckoutError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::ProductNotFound(ProductId::new(1)).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(
                CheckoutError::InsufficientStock {
                    product_id: ProductId::new(1),
                    requested: 3,
                    available: 1,
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_auth_mapping() {
        assert_eq!(
            get_status(AuthError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::UserAlreadyExists.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AuthError::AccountDisabled.into()),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Internal("connection string leaked".into());
        assert_eq!(err.message(), "Internal server error");

        let err: AppError = RepositoryError::DataCorruption("row 7".into()).into();
        assert_eq!(err.message(), "Internal server error");
    }

    #[tokio::test]
    async fn test_body_is_json() {
        let response = AppError::BadRequest("nope".into()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "nope");
    }
}
