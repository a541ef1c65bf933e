//! Users: one common profile plus a kind-specific payload.
//!
//! A customer carries nothing beyond the common profile (their cart and
//! wishlist are keyed by user id). A store owner additionally runs a store,
//! with its own ratings, counters, opening hours and social links.
//!
//! The profile picture and store logo are [`ImageSlot`]s loaded on demand,
//! so reading a user never pulls image bytes.
//!
//! [`ImageSlot`]: crate::aggregate::ImageSlot

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ValidationError, bounded_text};
use crate::aggregate::{RatingScore, RatingSummary, StoreCounters};
use crate::types::{
    AccountStatus, Email, PersonName, Phone, PostCode, Role, SellerStatus, UserId, UserType,
};

/// Fields every user has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    /// Database key.
    pub id: UserId,
    /// Given name.
    pub first_name: PersonName,
    /// Family name.
    pub last_name: PersonName,
    /// Optional contact email.
    pub email: Option<Email>,
    /// Login identifier, unique across users.
    pub phone: Phone,
    /// Optional postal code.
    pub post_code: Option<PostCode>,
    /// Date of birth, always in the past.
    pub birthday: Option<NaiveDate>,
    /// City of residence.
    pub city: Option<String>,
    /// Whether the phone number has been verified.
    pub is_verified: bool,
    /// Access role.
    pub role: Role,
    /// Account state.
    pub status: AccountStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// `"first last"`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }

    /// Whether the user is an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Check a birthday lies strictly before `today`.
///
/// # Errors
///
/// Returns `ValidationError::Field` for today or any future date.
pub fn validate_birthday(
    birthday: NaiveDate,
    today: NaiveDate,
) -> Result<NaiveDate, ValidationError> {
    if birthday < today {
        Ok(birthday)
    } else {
        Err(ValidationError::field("birthday", "must be in the past"))
    }
}

/// Customer payload. Empty: carts and wishlists hang off the user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CustomerProfile {}

/// Opening and closing time for one weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDayHours")]
pub struct DayHours {
    open: NaiveTime,
    close: NaiveTime,
}

#[derive(Deserialize)]
struct RawDayHours {
    open: NaiveTime,
    close: NaiveTime,
}

impl TryFrom<RawDayHours> for DayHours {
    type Error = ValidationError;

    fn try_from(raw: RawDayHours) -> Result<Self, Self::Error> {
        Self::new(raw.open, raw.close)
    }
}

impl DayHours {
    /// Validate a day's hours.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Field` unless `open` is before `close`.
    pub fn new(open: NaiveTime, close: NaiveTime) -> Result<Self, ValidationError> {
        if open < close {
            Ok(Self { open, close })
        } else {
            Err(ValidationError::field(
                "working_hours",
                "opening time must be before closing time",
            ))
        }
    }

    /// Opening time.
    #[must_use]
    pub const fn open(&self) -> NaiveTime {
        self.open
    }

    /// Closing time.
    #[must_use]
    pub const fn close(&self) -> NaiveTime {
        self.close
    }
}

/// Weekly opening hours. A missing day means closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkingHours {
    pub monday: Option<DayHours>,
    pub tuesday: Option<DayHours>,
    pub wednesday: Option<DayHours>,
    pub thursday: Option<DayHours>,
    pub friday: Option<DayHours>,
    pub saturday: Option<DayHours>,
    pub sunday: Option<DayHours>,
}

impl WorkingHours {
    /// Hours for a weekday, `None` when closed.
    #[must_use]
    pub const fn on(&self, day: chrono::Weekday) -> Option<DayHours> {
        use chrono::Weekday;
        match day {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }
}

/// A store's social media handles and website.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialLinks {
    pub instagram: Option<String>,
    pub telegram: Option<String>,
    pub whatsapp: Option<String>,
    pub website: Option<String>,
}

/// Store owner payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreProfile {
    /// Display name of the store.
    pub store_name: String,
    /// Free-text description.
    pub store_description: Option<String>,
    /// Moderation state of the seller.
    pub seller_status: SellerStatus,
    /// Ratings of the owner as a seller.
    pub seller_rating: RatingSummary,
    /// Ratings of the store itself.
    pub store_rating: RatingSummary,
    /// Orders and revenue.
    #[serde(flatten)]
    pub counters: StoreCounters,
    /// Weekly opening hours.
    pub working_hours: WorkingHours,
    /// Social media links.
    pub social_links: SocialLinks,
}

impl StoreProfile {
    /// Maximum store name length.
    pub const NAME_MAX: usize = 100;
    /// Maximum description length.
    pub const DESCRIPTION_MAX: usize = 1000;

    /// A newly registered store: approved, no ratings, no sales.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Field` for an empty or overlong name or
    /// description.
    pub fn new(
        store_name: &str,
        store_description: Option<&str>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            store_name: bounded_text("store_name", store_name, 1, Self::NAME_MAX)?,
            store_description: store_description
                .map(|d| bounded_text("store_description", d, 0, Self::DESCRIPTION_MAX))
                .transpose()?
                .filter(|d| !d.is_empty()),
            seller_status: SellerStatus::default(),
            seller_rating: RatingSummary::empty(),
            store_rating: RatingSummary::empty(),
            counters: StoreCounters::default(),
            working_hours: WorkingHours::default(),
            social_links: SocialLinks::default(),
        })
    }

    /// Fold a rating of the owner as a seller.
    pub fn rate_seller(&mut self, score: RatingScore) -> RatingSummary {
        self.seller_rating = self.seller_rating.submit(score);
        self.seller_rating
    }

    /// Fold a rating of the store.
    pub fn rate_store(&mut self, score: RatingScore) -> RatingSummary {
        self.store_rating = self.store_rating.submit(score);
        self.store_rating
    }
}

/// Kind-specific payload of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UserKind {
    Customer(CustomerProfile),
    StoreOwner(Box<StoreProfile>),
}

/// A user of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    #[serde(flatten)]
    pub profile: UserProfile,
    /// Discriminant, duplicated for clients.
    pub user_type: UserType,
    #[serde(flatten)]
    pub kind: UserKind,
}

impl User {
    /// Assemble a user from its parts. The discriminant follows `kind`.
    #[must_use]
    pub fn new(profile: UserProfile, kind: UserKind) -> Self {
        let user_type = match kind {
            UserKind::Customer(_) => UserType::Customer,
            UserKind::StoreOwner(_) => UserType::StoreOwner,
        };
        Self {
            profile,
            user_type,
            kind,
        }
    }

    /// `customer` or `store_owner`.
    #[must_use]
    pub const fn user_type(&self) -> UserType {
        self.user_type
    }

    /// The store payload, for store owners.
    #[must_use]
    pub fn store(&self) -> Option<&StoreProfile> {
        match &self.kind {
            UserKind::StoreOwner(store) => Some(store),
            UserKind::Customer(_) => None,
        }
    }

    /// Mutable store payload, for store owners.
    pub fn store_mut(&mut self) -> Option<&mut StoreProfile> {
        match &mut self.kind {
            UserKind::StoreOwner(store) => Some(store),
            UserKind::Customer(_) => None,
        }
    }
}
