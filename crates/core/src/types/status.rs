//! Enumerations stored as `PostgreSQL` enum types.

use serde::{Deserialize, Serialize};

/// Generates `Display`, `FromStr` and `as_str` for a snake-case enum.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// The wire and database representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", stringify!($name), ": {}"), s)),
                }
            }
        }
    };
}

/// Account role. Admins may act on any record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

string_enum!(Role { Customer => "customer", Admin => "admin" });

/// Account lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.account_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    Banned,
}

string_enum!(AccountStatus {
    Active => "active",
    Inactive => "inactive",
    Banned => "banned",
});

/// Discriminant selecting the user variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.user_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Customer,
    StoreOwner,
}

string_enum!(UserType {
    Customer => "customer",
    StoreOwner => "store_owner",
});

/// Whether a store owner may sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.seller_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SellerStatus {
    Pending,
    #[default]
    Approved,
    Suspended,
}

string_enum!(SellerStatus {
    Pending => "pending",
    Approved => "approved",
    Suspended => "suspended",
});

/// Product listing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.product_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
    OutOfStock,
}

string_enum!(ProductStatus {
    Active => "active",
    Inactive => "inactive",
    OutOfStock => "out_of_stock",
});

/// Catalog category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.product_category", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Men,
    Women,
    Kids,
    Accessories,
    #[default]
    Other,
}

string_enum!(Category {
    Men => "men",
    Women => "women",
    Kids => "kids",
    Accessories => "accessories",
    Other => "other",
});

impl Category {
    /// Every category, in display order.
    pub const ALL: [Self; 5] = [
        Self::Men,
        Self::Women,
        Self::Kids,
        Self::Accessories,
        Self::Other,
    ];
}

/// How an order is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    CashOnDelivery,
    Wallet,
}

string_enum!(PaymentMethod {
    Card => "card",
    CashOnDelivery => "cash_on_delivery",
    Wallet => "wallet",
});

/// Order lifecycle status.
///
/// ```text
/// pending ──► paid ──► shipped ──► delivered
///    │          │
///    └──────────┴──► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

string_enum!(OrderStatus {
    Pending => "pending",
    Paid => "paid",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Whether moving from `self` to `next` is an allowed transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Cancelled)
                | (Self::Paid, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// Delivered and cancelled orders never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_happy_path() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_order_status_rejects_skips_and_reversals() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_string_round_trip() {
        assert_eq!(UserType::StoreOwner.to_string(), "store_owner");
        assert_eq!(
            "cash_on_delivery".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::CashOnDelivery
        );
        assert!("vip".parse::<Role>().is_err());
    }

    #[test]
    fn test_defaults_match_new_records() {
        assert_eq!(SellerStatus::default(), SellerStatus::Approved);
        assert_eq!(ProductStatus::default(), ProductStatus::Active);
        assert_eq!(AccountStatus::default(), AccountStatus::Active);
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&ProductStatus::OutOfStock).unwrap();
        assert_eq!(json, "\"out_of_stock\"");
    }
}
