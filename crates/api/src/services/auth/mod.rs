//! Authentication service.
//!
//! Registers customers and store owners and logs users in with their phone
//! number and password.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use marketplace_core::model::{StoreProfile, User, validate_birthday};
use marketplace_core::{AccountStatus, Email, PersonName, Phone, PostCode, Role};

use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length. Argon2 hashes anything, this only bounds work.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Account fields submitted at registration.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub post_code: Option<String>,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub city: Option<String>,
}

impl Registration {
    /// Validate every field into a [`NewUser`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for the first malformed field.
    pub fn validate(&self, today: NaiveDate) -> Result<NewUser, AuthError> {
        Ok(NewUser {
            first_name: PersonName::parse(&self.first_name)?,
            last_name: PersonName::parse(&self.last_name)?,
            email: non_blank(self.email.as_deref())
                .map(Email::parse)
                .transpose()?,
            phone: Phone::parse(&self.phone)?,
            post_code: non_blank(self.post_code.as_deref())
                .map(PostCode::parse)
                .transpose()?,
            birthday: self
                .birthday
                .map(|b| validate_birthday(b, today))
                .transpose()?,
            city: non_blank(self.city.as_deref()).map(str::to_owned),
            role: Role::Customer,
        })
    }
}

/// Registration of a store owner: the account plus the store.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreRegistration {
    #[serde(flatten)]
    pub account: Registration,
    pub store_name: String,
    #[serde(default)]
    pub store_description: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Authentication service.
///
/// Handles registration and phone + password login.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a customer account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if a field is malformed.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the phone or email is registered.
    pub async fn register_customer(&self, form: &Registration) -> Result<User, AuthError> {
        let user = form.validate(Utc::now().date_naive())?;
        self.create(&user, None, &form.password).await
    }

    /// Register a store owner together with their store.
    ///
    /// # Errors
    ///
    /// Same as [`Self::register_customer`], plus `AuthError::Validation` for an
    /// invalid store name or description.
    pub async fn register_store_owner(
        &self,
        form: &StoreRegistration,
    ) -> Result<User, AuthError> {
        let user = form.account.validate(Utc::now().date_naive())?;
        let store = StoreProfile::new(&form.store_name, form.store_description.as_deref())?;
        self.create(&user, Some(&store), &form.account.password)
            .await
    }

    async fn create(
        &self,
        user: &NewUser,
        store: Option<&StoreProfile>,
        password: &str,
    ) -> Result<User, AuthError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        self.users
            .create(user, store, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Login with phone number and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the phone/password is wrong.
    /// Returns `AuthError::AccountDisabled` if the account may not sign in.
    pub async fn login(&self, phone: &str, password: &str) -> Result<User, AuthError> {
        let phone = Phone::parse(phone).map_err(|_| AuthError::InvalidCredentials)?;

        let credentials = self
            .users
            .get_credentials(&phone)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &credentials.password_hash)?;

        if credentials.status != AccountStatus::Active {
            return Err(AuthError::AccountDisabled);
        }

        self.users
            .get_by_id(credentials.id)
            .await?
            .ok_or(AuthError::InvalidCredentials)
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registration() -> Registration {
        Registration {
            first_name: "Sara".into(),
            last_name: "Karimi".into(),
            phone: "09123456789".into(),
            password: "correct horse battery".into(),
            email: Some("  ".into()),
            post_code: None,
            birthday: NaiveDate::from_ymd_opt(1995, 4, 2),
            city: Some("Tehran".into()),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("s3cret-pass", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong-pass", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_password_length() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password(&"x".repeat(200)).is_err());
    }

    #[test]
    fn test_registration_validates() {
        let user = registration().validate(today()).unwrap();
        assert_eq!(user.phone.as_str(), "09123456789");
        assert!(user.email.is_none(), "blank email is treated as absent");
        assert_eq!(user.role, Role::Customer);
    }

    #[test]
    fn test_registration_rejects_bad_phone() {
        let mut form = registration();
        form.phone = "9123456789".into();
        assert!(matches!(
            form.validate(today()),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn test_registration_rejects_future_birthday() {
        let mut form = registration();
        form.birthday = NaiveDate::from_ymd_opt(2030, 1, 1);
        assert!(form.validate(today()).is_err());
    }

    #[test]
    fn test_store_registration_flattens_account() {
        let form: StoreRegistration = serde_json::from_value(serde_json::json!({
            "first_name": "Reza",
            "last_name": "Ahmadi",
            "phone": "09120000000",
            "password": "password123",
            "store_name": "Reza Books"
        }))
        .unwrap();
        assert_eq!(form.account.first_name, "Reza");
        assert_eq!(form.store_name, "Reza Books");
        assert!(form.store_description.is_none());
    }
}
