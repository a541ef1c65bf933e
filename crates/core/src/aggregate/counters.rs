//! Monotonic activity counters for products and stores.
//!
//! Counters only ever go up. Product views increment when a product page is
//! viewed, product sales increment once per order line, and a store's sales
//! and revenue increment when an order is placed against it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::AggregateError;

/// A non-decreasing event counter.
///
/// Saturates at `u64::MAX` instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counter(u64);

impl Counter {
    /// A counter starting at zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Wrap a persisted value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Current value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The counter after one more event.
    #[must_use]
    pub const fn increment(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// View and sales counters owned by a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductCounters {
    /// Times the product detail was viewed.
    pub views: Counter,
    /// Order lines that included the product.
    pub sales_count: Counter,
}

impl ProductCounters {
    /// Counters after one more view.
    #[must_use]
    pub const fn increment_views(self) -> Self {
        Self {
            views: self.views.increment(),
            ..self
        }
    }

    /// Counters after one more sale.
    #[must_use]
    pub const fn increment_sales(self) -> Self {
        Self {
            sales_count: self.sales_count.increment(),
            ..self
        }
    }
}

/// Sales totals owned by a store owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreCounters {
    /// Number of orders placed against the store.
    pub total_sales: Counter,
    /// Sum of those orders' totals.
    pub total_revenue: Decimal,
}

impl StoreCounters {
    /// Counters after recording one order worth `amount`.
    ///
    /// # Errors
    ///
    /// Returns `AggregateError::InvalidValue` if `amount` is negative. The
    /// counters are not modified in that case.
    pub fn increment_sales(self, amount: Decimal) -> Result<Self, AggregateError> {
        if amount < Decimal::ZERO {
            return Err(AggregateError::invalid("amount", "must not be negative"));
        }
        Ok(Self {
            total_sales: self.total_sales.increment(),
            total_revenue: self.total_revenue.saturating_add(amount),
        })
    }
}
