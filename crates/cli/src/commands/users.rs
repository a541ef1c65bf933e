//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create an admin account (password read from MP_ADMIN_PASSWORD if not given)
//! mp-cli user create-admin --phone 09120000000 --first-name Sara --last-name Karimi
//!
//! # Grant admin to an existing account
//! mp-cli user promote --phone 09120000000
//!
//! # Approve or suspend a seller
//! mp-cli user seller-status --id 42 --status suspended
//! ```

use sqlx::PgPool;

use marketplace_api::db::{RepositoryError, UserRepository};
use marketplace_api::services::auth::{AuthService, Registration};
use marketplace_core::{Phone, Role, SellerStatus, UserId, ValidationError};

use super::{CommandError, connect};

async fn find_by_phone(pool: &PgPool, phone: &str) -> Result<UserId, CommandError> {
    let phone = Phone::parse(phone)
        .map_err(|e| CommandError::InvalidArgument(format!("invalid phone: {e}")))?;
    UserRepository::new(pool)
        .get_credentials(&phone)
        .await?
        .map(|c| c.id)
        .ok_or_else(|| CommandError::InvalidArgument(format!("no user with phone {phone}")))
}

/// Register a customer account and make it an admin.
///
/// # Errors
///
/// Returns `CommandError::Auth` for invalid fields, a weak password or a
/// phone that is already registered.
pub async fn create_admin(
    phone: &str,
    first_name: &str,
    last_name: &str,
    password: &str,
) -> Result<UserId, CommandError> {
    let pool = connect().await?;

    let registration = Registration {
        first_name: first_name.to_owned(),
        last_name: last_name.to_owned(),
        phone: phone.to_owned(),
        password: password.to_owned(),
        email: None,
        post_code: None,
        birthday: None,
        city: None,
    };
    let user = AuthService::new(&pool)
        .register_customer(&registration)
        .await?;
    let id = user.profile.id;

    set_role(&pool, id, Role::Admin).await?;
    tracing::info!("Admin user created successfully! ID: {}, Phone: {}", id, phone);
    Ok(id)
}

/// Give an existing account the admin role.
///
/// # Errors
///
/// Returns `CommandError::InvalidArgument` if no account has this phone.
pub async fn promote(phone: &str) -> Result<UserId, CommandError> {
    let pool = connect().await?;
    let id = find_by_phone(&pool, phone).await?;
    set_role(&pool, id, Role::Admin).await?;
    tracing::info!("User {} is now an admin", id);
    Ok(id)
}

async fn set_role(pool: &PgPool, id: UserId, role: Role) -> Result<(), CommandError> {
    UserRepository::new(pool)
        .update_with(id, |user| {
            user.profile.role = role;
            Ok(())
        })
        .await?;
    Ok(())
}

/// Set a store owner's moderation status.
///
/// # Errors
///
/// Returns `CommandError::Repository` if the user does not exist or is not a
/// store owner.
pub async fn set_seller_status(id: i64, status: &str) -> Result<(), CommandError> {
    let status: SellerStatus = status
        .parse()
        .map_err(CommandError::InvalidArgument)?;
    let id = UserId::new(id);
    let pool = connect().await?;

    UserRepository::new(&pool)
        .update_with(id, |user| {
            let store = user.store_mut().ok_or_else(|| {
                RepositoryError::from(ValidationError::field("user", "not a store owner"))
            })?;
            store.seller_status = status;
            Ok(())
        })
        .await?;

    tracing::info!("Seller {} status set to {}", id, status);
    Ok(())
}
