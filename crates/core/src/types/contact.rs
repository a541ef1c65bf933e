//! Validated contact values: phone numbers, post codes, emails and names.
//!
//! Each type is only constructible through `parse`, so a value that reaches
//! the database layer has already been checked.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors produced while parsing contact values.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// Phone number does not match `09` followed by nine digits.
    #[error("phone must start with 09 and be exactly 11 digits")]
    InvalidPhone,
    /// Post code is not ten digits.
    #[error("post code must be exactly 10 digits")]
    InvalidPostCode,
    /// The email is empty.
    #[error("email cannot be empty")]
    EmptyEmail,
    /// The email is longer than allowed.
    #[error("email must be at most {max} characters")]
    EmailTooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The email is not `local@domain`.
    #[error("email must have the form local@domain")]
    MalformedEmail,
    /// A name is outside its length bounds.
    #[error("name must be between {min} and {max} characters")]
    NameLength {
        /// Minimum length.
        min: usize,
        /// Maximum length.
        max: usize,
    },
}

/// Implements `sqlx` `TEXT` encoding for a string newtype.
///
/// Values read back from the database are trusted; they were validated on
/// the way in.
macro_rules! text_column {
    ($name:ident) => {
        #[cfg(feature = "postgres")]
        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                <String as sqlx::Decode<sqlx::Postgres>>::decode(value).map(Self)
            }
        }

        #[cfg(feature = "postgres")]
        impl sqlx::Encode<'_, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl $name {
            /// Borrow the value as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

/// A mobile phone number used as the login identifier.
///
/// Exactly eleven ASCII digits, starting with `09`.
///
/// ```
/// use marketplace_core::Phone;
///
/// assert!(Phone::parse("09123456789").is_ok());
/// assert!(Phone::parse("9123456789").is_err());
/// assert!(Phone::parse("0912345678a").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Phone(String);

impl Phone {
    /// Required length in digits.
    pub const LENGTH: usize = 11;

    /// Parse a phone number, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `ContactError::InvalidPhone` if the input is not `09` followed
    /// by nine more digits.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        let valid = s.len() == Self::LENGTH
            && s.starts_with("09")
            && s.bytes().all(|b| b.is_ascii_digit());
        if valid {
            Ok(Self(s.to_owned()))
        } else {
            Err(ContactError::InvalidPhone)
        }
    }
}

impl TryFrom<String> for Phone {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Phone> for String {
    fn from(phone: Phone) -> Self {
        phone.0
    }
}

text_column!(Phone);

/// A ten-digit postal code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PostCode(String);

impl PostCode {
    /// Parse a post code.
    ///
    /// # Errors
    ///
    /// Returns `ContactError::InvalidPostCode` unless the input is exactly ten
    /// ASCII digits.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        if s.len() == 10 && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_owned()))
        } else {
            Err(ContactError::InvalidPostCode)
        }
    }
}

impl TryFrom<String> for PostCode {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PostCode> for String {
    fn from(code: PostCode) -> Self {
        code.0
    }
}

text_column!(PostCode);

/// An email address with a minimal structural check.
///
/// ```
/// use marketplace_core::Email;
///
/// assert!(Email::parse("buyer@example.com").is_ok());
/// assert!(Email::parse("@example.com").is_err());
/// assert!(Email::parse("a@b@c").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Maximum length (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse an email address. The result is lowercased.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or not of the form
    /// `local@domain` with exactly one `@`.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ContactError::EmptyEmail);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(ContactError::EmailTooLong {
                max: Self::MAX_LENGTH,
            });
        }

        match s.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(Self(s.to_lowercase()))
            }
            _ => Err(ContactError::MalformedEmail),
        }
    }

    /// The part after the `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, domain)| domain)
    }
}

impl TryFrom<String> for Email {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

text_column!(Email);

/// A first or last name, 2 to 50 characters after trimming.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PersonName(String);

impl PersonName {
    /// Minimum length in characters.
    pub const MIN_LENGTH: usize = 2;
    /// Maximum length in characters.
    pub const MAX_LENGTH: usize = 50;

    /// Parse a name.
    ///
    /// # Errors
    ///
    /// Returns `ContactError::NameLength` if the trimmed name is too short or
    /// too long.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        let len = s.chars().count();
        if (Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&len) {
            Ok(Self(s.to_owned()))
        } else {
            Err(ContactError::NameLength {
                min: Self::MIN_LENGTH,
                max: Self::MAX_LENGTH,
            })
        }
    }
}

impl TryFrom<String> for PersonName {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PersonName> for String {
    fn from(name: PersonName) -> Self {
        name.0
    }
}

text_column!(PersonName);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_accepts_local_mobile_numbers() {
        assert_eq!(Phone::parse(" 09123456789 ").unwrap().as_str(), "09123456789");
    }

    #[test]
    fn test_phone_rejects_wrong_prefix_and_length() {
        assert_eq!(Phone::parse("08123456789"), Err(ContactError::InvalidPhone));
        assert_eq!(Phone::parse("0912345678"), Err(ContactError::InvalidPhone));
        assert_eq!(Phone::parse("091234567890"), Err(ContactError::InvalidPhone));
    }

    #[test]
    fn test_post_code() {
        assert!(PostCode::parse("1234567890").is_ok());
        assert_eq!(PostCode::parse("12345"), Err(ContactError::InvalidPostCode));
    }

    #[test]
    fn test_email_is_lowercased() {
        let email = Email::parse("Jane@Store.com").unwrap();
        assert_eq!(email.as_str(), "jane@store.com");
        assert_eq!(email.domain(), "store.com");
    }

    #[test]
    fn test_email_rejects_malformed() {
        assert_eq!(Email::parse(""), Err(ContactError::EmptyEmail));
        assert_eq!(Email::parse("user@"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("no-at"), Err(ContactError::MalformedEmail));
        assert!(matches!(
            Email::parse(&format!("{}@x.com", "a".repeat(260))),
            Err(ContactError::EmailTooLong { .. })
        ));
    }

    #[test]
    fn test_person_name_bounds() {
        assert!(PersonName::parse("Jo").is_ok());
        assert!(PersonName::parse("J").is_err());
        assert!(PersonName::parse(&"x".repeat(51)).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let phone: Result<Phone, _> = serde_json::from_str("\"12345\"");
        assert!(phone.is_err());

        let phone: Phone = serde_json::from_str("\"09198765432\"").unwrap();
        assert_eq!(phone.to_string(), "09198765432");
    }
}
