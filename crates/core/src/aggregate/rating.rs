//! Running rating averages.
//!
//! A [`RatingSummary`] is the `(average, count)` pair attached to every rated
//! aspect: a product, a store owner as seller, and a store owner as store.
//! Ratings are append-only; there is no retraction.
//!
//! The summary also carries the running total of every submitted score. The
//! reported average is always `round(total / count, 2)`, so rounding error never
//! accumulates across submissions.
//!
//! Rounding is half-up (midpoint away from zero) to two decimal places.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::AggregateError;

/// Number of decimal places kept in a reported average.
pub const AVERAGE_SCALE: u32 = 2;

/// A single validated rating score in the inclusive range `0..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct RatingScore(Decimal);

impl RatingScore {
    /// Lowest accepted score.
    pub const MIN: Decimal = Decimal::ZERO;
    /// Highest accepted score.
    pub const MAX: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

    /// Validate a score.
    ///
    /// # Errors
    ///
    /// Returns `AggregateError::InvalidValue` if the value is below 0, above 5,
    /// or has more decimal places than [`AVERAGE_SCALE`].
    pub fn new(value: Decimal) -> Result<Self, AggregateError> {
        if value < Self::MIN || value > Self::MAX {
            return Err(AggregateError::invalid(
                "rating",
                format!("must be between {} and {}", Self::MIN, Self::MAX),
            ));
        }
        if value.normalize().scale() > AVERAGE_SCALE {
            return Err(AggregateError::invalid(
                "rating",
                format!("at most {AVERAGE_SCALE} decimal places"),
            ));
        }
        Ok(Self(value))
    }

    /// The score as a decimal.
    #[must_use]
    pub const fn value(self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for RatingScore {
    type Error = AggregateError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RatingScore> for Decimal {
    fn from(score: RatingScore) -> Self {
        score.0
    }
}

/// Running aggregate of every rating submitted for one rated aspect.
///
/// Serializes as `{"average": …, "count": …}`; the running total stays internal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RatingSummary {
    average: Decimal,
    count: u32,
    #[serde(skip)]
    total: Decimal,
}

impl RatingSummary {
    /// A summary with no ratings yet.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            average: Decimal::ZERO,
            count: 0,
            total: Decimal::ZERO,
        }
    }

    /// Rebuild a summary from its persisted running total and count.
    ///
    /// A zero count always yields the empty summary, whatever the total says.
    #[must_use]
    pub fn from_parts(total: Decimal, count: u32) -> Self {
        if count == 0 {
            return Self::empty();
        }
        Self {
            average: mean(total, count),
            count,
            total,
        }
    }

    /// Fold one more rating into the summary.
    ///
    /// Returns the new summary; `self` is left unchanged so the caller decides
    /// when the result is persisted.
    #[must_use]
    pub fn submit(&self, score: RatingScore) -> Self {
        let count = self.count.saturating_add(1);
        let total = self.total.saturating_add(score.value());
        Self {
            average: mean(total, count),
            count,
            total,
        }
    }

    /// Arithmetic mean of all submitted scores, rounded to two places.
    /// Zero when nothing has been submitted.
    #[must_use]
    pub const fn average(&self) -> Decimal {
        self.average
    }

    /// Number of scores submitted.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Sum of every submitted score.
    #[must_use]
    pub const fn total(&self) -> Decimal {
        self.total
    }
}

fn mean(total: Decimal, count: u32) -> Decimal {
    (total / Decimal::from(count))
        .round_dp_with_strategy(AVERAGE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn score(units: i64, scale: u32) -> RatingScore {
        RatingScore::new(Decimal::new(units, scale)).unwrap()
    }

    #[test]
    fn test_empty_summary_reports_zero() {
        let summary = RatingSummary::empty();
        assert_eq!(summary.average(), Decimal::ZERO);
        assert_eq!(summary.count(), 0);
    }

    #[test]
    fn test_two_submissions_average() {
        let summary = RatingSummary::empty()
            .submit(score(45, 1))
            .submit(score(35, 1));

        assert_eq!(summary.average(), Decimal::new(4, 0));
        assert_eq!(summary.count(), 2);
    }

    #[test]
    fn test_first_submission_is_the_average() {
        let summary = RatingSummary::empty().submit(score(45, 1));
        assert_eq!(summary.average(), Decimal::new(45, 1));
        assert_eq!(summary.count(), 1);
    }

    #[test]
    fn test_submit_does_not_mutate_input() {
        let before = RatingSummary::empty();
        let _ = before.submit(score(5, 0));
        assert_eq!(before, RatingSummary::empty());
    }

    #[test]
    fn test_rounds_half_up() {
        // (5 + 4 + 4) / 3 = 4.3333… → 4.33
        let summary = RatingSummary::empty()
            .submit(score(5, 0))
            .submit(score(4, 0))
            .submit(score(4, 0));
        assert_eq!(summary.average(), Decimal::new(433, 2));

        // (1 + 0.01) / 2 = 0.505 → 0.51
        let summary = RatingSummary::empty()
            .submit(score(1, 0))
            .submit(score(1, 2));
        assert_eq!(summary.average(), Decimal::new(51, 2));
    }

    #[test]
    fn test_long_sequence_matches_exact_mean() {
        let values: Vec<i64> = (0..200).map(|i| (i * 7 + 3) % 51).collect();
        let summary = values
            .iter()
            .fold(RatingSummary::empty(), |acc, &v| acc.submit(score(v, 1)));

        let sum: i64 = values.iter().sum();
        let expected = (Decimal::new(sum, 1) / Decimal::from(values.len()))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        assert_eq!(summary.count(), 200);
        assert_eq!(summary.average(), expected);
    }

    #[test]
    fn test_from_parts_recomputes_average() {
        let summary = RatingSummary::from_parts(Decimal::new(8, 0), 2);
        assert_eq!(summary.average(), Decimal::new(4, 0));

        let summary = RatingSummary::from_parts(Decimal::new(8, 0), 0);
        assert_eq!(summary, RatingSummary::empty());
    }

    #[test]
    fn test_score_bounds() {
        assert!(RatingScore::new(Decimal::ZERO).is_ok());
        assert!(RatingScore::new(Decimal::new(5, 0)).is_ok());
        assert!(RatingScore::new(Decimal::new(51, 1)).is_err());
        assert!(RatingScore::new(Decimal::new(-1, 1)).is_err());
        assert!(RatingScore::new(Decimal::new(4555, 3)).is_err());
    }

    #[test]
    fn test_score_deserialize_rejects_out_of_range() {
        let ok: RatingScore = serde_json::from_str("4.5").unwrap();
        assert_eq!(ok.value(), Decimal::new(45, 1));
        assert!(serde_json::from_str::<RatingScore>("7").is_err());
    }

    #[test]
    fn test_serializes_without_total() {
        let summary = RatingSummary::empty().submit(score(3, 0));
        let json = serde_json::to_value(summary).unwrap();
        assert!(json.get("average").is_some());
        assert_eq!(json["count"], 1);
        assert!(json.get("total").is_none());
    }
}
