//! Catalog products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::{ValidationError, bounded_text};
use crate::aggregate::{ProductCounters, RatingScore, RatingSummary};
use crate::types::{Category, ProductId, ProductStatus, UserId};

/// Stock at or below this (but above zero) counts as low.
pub const LOW_STOCK_THRESHOLD: u32 = 10;

/// A stock keeping unit, unique within one store.
///
/// Stored uppercase. Letters, digits, `-` and `_` only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    /// Maximum length.
    pub const MAX_LENGTH: usize = 50;

    /// Parse a SKU.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Field` for an empty or overlong code or one
    /// with characters outside `[A-Za-z0-9_-]`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let s = bounded_text("sku", s, 1, Self::MAX_LENGTH)?;
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::field(
                "sku",
                "only letters, digits, '-' and '_' are allowed",
            ));
        }
        Ok(Self(s.to_ascii_uppercase()))
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Sku {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self {
        sku.0
    }
}

impl std::fmt::Display for Sku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A product listed by a store owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub store_owner_id: UserId,
    pub title: String,
    pub description: String,
    pub sku: Sku,
    pub price: Decimal,
    pub compare_price: Option<Decimal>,
    pub stock: u32,
    pub category: Category,
    pub status: ProductStatus,
    #[serde(flatten)]
    pub counters: ProductCounters,
    pub rating: RatingSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// At least one unit available.
    #[must_use]
    pub const fn is_in_stock(&self) -> bool {
        self.stock > 0
    }

    /// In stock, but no more than [`LOW_STOCK_THRESHOLD`] units.
    #[must_use]
    pub const fn is_low_stock(&self) -> bool {
        self.stock > 0 && self.stock <= LOW_STOCK_THRESHOLD
    }

    /// Whole-percent discount against the compare-at price, rounded down.
    ///
    /// Zero when there is no compare-at price or it does not exceed the price.
    #[must_use]
    pub fn discount_percentage(&self) -> u32 {
        match self.compare_price {
            Some(compare) if compare > self.price && compare > Decimal::ZERO => {
                ((compare - self.price) / compare * Decimal::ONE_HUNDRED)
                    .floor()
                    .to_u32()
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Whether customers can currently buy the product.
    #[must_use]
    pub fn is_purchasable(&self) -> bool {
        self.status == ProductStatus::Active && self.is_in_stock()
    }

    /// Fold a customer rating into the product's summary.
    pub fn rate(&mut self, score: RatingScore) -> RatingSummary {
        self.rating = self.rating.submit(score);
        self.rating
    }

    /// Keep `status` consistent with `stock`.
    ///
    /// An active product that runs out becomes `out_of_stock`; an
    /// `out_of_stock` product that is restocked becomes active again. An
    /// `inactive` product stays inactive.
    pub fn sync_stock_status(&mut self) {
        self.status = match (self.status, self.stock) {
            (ProductStatus::Active, 0) => ProductStatus::OutOfStock,
            (ProductStatus::OutOfStock, n) if n > 0 => ProductStatus::Active,
            (status, _) => status,
        };
    }
}

/// Derived metrics sent alongside a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProductMetrics {
    pub is_in_stock: bool,
    pub is_low_stock: bool,
    pub discount_percentage: u32,
}

impl From<&Product> for ProductMetrics {
    fn from(product: &Product) -> Self {
        Self {
            is_in_stock: product.is_in_stock(),
            is_low_stock: product.is_low_stock(),
            discount_percentage: product.discount_percentage(),
        }
    }
}

fn validate_price(field: &'static str, price: Decimal) -> Result<Decimal, ValidationError> {
    if price < Decimal::ZERO {
        return Err(ValidationError::field(field, "must not be negative"));
    }
    if price.normalize().scale() > 2 {
        return Err(ValidationError::field(field, "at most 2 decimal places"));
    }
    Ok(price)
}

/// Maximum title length.
pub const TITLE_MAX: usize = 200;
/// Maximum description length.
pub const DESCRIPTION_MAX: usize = 5000;

/// A product as submitted for creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewProduct {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub sku: Sku,
    pub price: Decimal,
    #[serde(default)]
    pub compare_price: Option<Decimal>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub category: Category,
}

impl NewProduct {
    /// Check field rules and normalize whitespace.
    ///
    /// # Errors
    ///
    /// Returns the first rule that fails.
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            title: bounded_text("title", &self.title, 1, TITLE_MAX)?,
            description: bounded_text("description", &self.description, 0, DESCRIPTION_MAX)?,
            sku: self.sku,
            price: validate_price("price", self.price)?,
            compare_price: self
                .compare_price
                .map(|p| validate_price("compare_price", p))
                .transpose()?,
            stock: self.stock,
            category: self.category,
        })
    }

    /// Initial status for the stock level.
    #[must_use]
    pub const fn initial_status(&self) -> ProductStatus {
        if self.stock == 0 {
            ProductStatus::OutOfStock
        } else {
            ProductStatus::Active
        }
    }
}

/// A partial product edit. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProductUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub sku: Option<Sku>,
    pub price: Option<Decimal>,
    pub compare_price: Option<Decimal>,
    pub stock: Option<u32>,
    pub category: Option<Category>,
    pub status: Option<ProductStatus>,
}

impl ProductUpdate {
    /// Apply the edit to `product`.
    ///
    /// Every field is validated before anything is written, so on error the
    /// product is unchanged. The status is re-synced with the new stock level
    /// unless the edit sets a status explicitly.
    ///
    /// # Errors
    ///
    /// Returns the first rule that fails.
    pub fn apply(self, product: &mut Product) -> Result<(), ValidationError> {
        let title = self
            .title
            .map(|t| bounded_text("title", &t, 1, TITLE_MAX))
            .transpose()?;
        let description = self
            .description
            .map(|d| bounded_text("description", &d, 0, DESCRIPTION_MAX))
            .transpose()?;
        let price = self.price.map(|p| validate_price("price", p)).transpose()?;
        let compare_price = self
            .compare_price
            .map(|p| validate_price("compare_price", p))
            .transpose()?;

        if let Some(title) = title {
            product.title = title;
        }
        if let Some(description) = description {
            product.description = description;
        }
        if let Some(sku) = self.sku {
            product.sku = sku;
        }
        if let Some(price) = price {
            product.price = price;
        }
        if let Some(compare_price) = compare_price {
            product.compare_price = Some(compare_price);
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        match self.status {
            Some(status) => product.status = status,
            None => product.sync_stock_status(),
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(price: Decimal, compare: Option<Decimal>, stock: u32) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(1),
            store_owner_id: UserId::new(2),
            title: "Linen shirt".into(),
            description: String::new(),
            sku: Sku::parse("ls-01").unwrap(),
            price,
            compare_price: compare,
            stock,
            category: Category::Men,
            status: ProductStatus::Active,
            counters: ProductCounters::default(),
            rating: RatingSummary::empty(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_stock_flags() {
        assert!(!product(Decimal::ONE, None, 0).is_in_stock());
        assert!(!product(Decimal::ONE, None, 0).is_low_stock());
        assert!(product(Decimal::ONE, None, 10).is_low_stock());
        assert!(!product(Decimal::ONE, None, 11).is_low_stock());
        assert!(product(Decimal::ONE, None, 11).is_in_stock());
    }

    #[test]
    fn test_discount_percentage_floors() {
        // (150 - 100) / 150 = 33.33…%
        let p = product(Decimal::new(100, 0), Some(Decimal::new(150, 0)), 1);
        assert_eq!(p.discount_percentage(), 33);

        let p = product(Decimal::new(100, 0), Some(Decimal::new(80, 0)), 1);
        assert_eq!(p.discount_percentage(), 0);

        let p = product(Decimal::new(100, 0), None, 1);
        assert_eq!(p.discount_percentage(), 0);
    }

    #[test]
    fn test_sku_normalizes_and_rejects() {
        assert_eq!(Sku::parse(" ab-1_x ").unwrap().as_str(), "AB-1_X");
        assert!(Sku::parse("").is_err());
        assert!(Sku::parse("a b").is_err());
    }

    #[test]
    fn test_new_product_validation() {
        let json = r#"{"title":"  Hat ","sku":"hat-1","price":"19.99","stock":0}"#;
        let new: NewProduct = serde_json::from_str(json).unwrap();
        let new = new.validated().unwrap();
        assert_eq!(new.title, "Hat");
        assert_eq!(new.category, Category::Other);
        assert_eq!(new.initial_status(), ProductStatus::OutOfStock);

        let bad: NewProduct =
            serde_json::from_str(r#"{"title":"Hat","sku":"h","price":"-1"}"#).unwrap();
        assert!(bad.validated().is_err());
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let mut p = product(Decimal::new(10, 0), None, 5);
        let before = p.clone();
        let update = ProductUpdate {
            title: Some("New".into()),
            price: Some(Decimal::new(-5, 0)),
            ..ProductUpdate::default()
        };
        assert!(update.apply(&mut p).is_err());
        assert_eq!(p, before);
    }

    #[test]
    fn test_update_stock_syncs_status() {
        let mut p = product(Decimal::new(10, 0), None, 5);
        ProductUpdate {
            stock: Some(0),
            ..ProductUpdate::default()
        }
        .apply(&mut p)
        .unwrap();
        assert_eq!(p.status, ProductStatus::OutOfStock);

        ProductUpdate {
            stock: Some(3),
            ..ProductUpdate::default()
        }
        .apply(&mut p)
        .unwrap();
        assert_eq!(p.status, ProductStatus::Active);
    }

    #[test]
    fn test_inactive_product_stays_inactive() {
        let mut p = product(Decimal::new(10, 0), None, 0);
        p.status = ProductStatus::Inactive;
        p.sync_stock_status();
        assert_eq!(p.status, ProductStatus::Inactive);
        assert!(!p.is_purchasable());
    }

    #[test]
    fn test_rate_updates_summary() {
        let mut p = product(Decimal::new(10, 0), None, 1);
        p.rate(RatingScore::new(Decimal::new(45, 1)).unwrap());
        p.rate(RatingScore::new(Decimal::new(35, 1)).unwrap());
        assert_eq!(p.rating.average(), Decimal::new(4, 0));
        assert_eq!(p.rating.count(), 2);
    }
}
