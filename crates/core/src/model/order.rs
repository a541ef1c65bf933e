//! Orders and checkout planning.
//!
//! Checkout turns a cart into one order per store represented in it. The
//! planning step here is pure: it snapshots titles and prices, checks stock
//! against the loaded products and computes totals. The API performs the
//! resulting writes in a single transaction.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Product, ValidationError, bounded_text};
use crate::aggregate::{CartItems, Quantity};
use crate::types::{OrderId, OrderStatus, PaymentMethod, ProductId, ProductStatus, UserId};

/// Free-text delivery address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShippingAddress(String);

impl ShippingAddress {
    pub const MIN_LENGTH: usize = 5;
    pub const MAX_LENGTH: usize = 500;

    /// Validate an address.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Field` when the trimmed text is too short or
    /// too long.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        bounded_text("shipping_address", s, Self::MIN_LENGTH, Self::MAX_LENGTH).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ShippingAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShippingAddress> for String {
    fn from(address: ShippingAddress) -> Self {
        address.0
    }
}

/// One product line of an order, priced at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    /// Product title when the order was placed.
    pub title: String,
    /// Unit price when the order was placed.
    pub price: Decimal,
    pub quantity: Quantity,
    pub color: Option<String>,
    pub size: Option<String>,
}

impl OrderItem {
    /// `price * quantity`.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity.get())
    }
}

/// Sum of line totals.
fn sum_items(items: &[OrderItem]) -> Decimal {
    items.iter().map(OrderItem::total).sum()
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: UserId,
    pub store_owner_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A status change the order lifecycle does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move order from {from} to {to}")]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl Order {
    /// Move the order to `next`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the lifecycle does not allow it; the
    /// order is unchanged.
    pub const fn transition_to(&mut self, next: OrderStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// The order to be created for one store during checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub store_owner_id: UserId,
    pub items: Vec<OrderItem>,
}

impl OrderDraft {
    /// Amount charged for this order.
    #[must_use]
    pub fn total(&self) -> Decimal {
        sum_items(&self.items)
    }
}

/// Why a cart cannot be turned into orders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("product {0} no longer exists")]
    ProductNotFound(ProductId),

    #[error("product {0} is not available for purchase")]
    Unavailable(ProductId),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },
}

/// Plan the orders for a cart.
///
/// `products` must contain every product referenced by the cart. Drafts are
/// grouped by store and ordered by store id; items keep their cart order.
///
/// # Errors
///
/// Returns `CheckoutError` for an empty cart, a missing or unavailable
/// product, or a line asking for more units than are in stock.
pub fn plan_checkout(
    cart: &CartItems,
    products: &[Product],
) -> Result<Vec<OrderDraft>, CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();
    let mut by_store: BTreeMap<UserId, Vec<OrderItem>> = BTreeMap::new();

    for line in cart.entries() {
        let product = by_id
            .get(&line.product_id)
            .ok_or(CheckoutError::ProductNotFound(line.product_id))?;
        if product.status != ProductStatus::Active {
            return Err(CheckoutError::Unavailable(product.id));
        }
        if line.quantity.get() > product.stock {
            return Err(CheckoutError::InsufficientStock {
                product_id: product.id,
                requested: line.quantity.get(),
                available: product.stock,
            });
        }
        by_store
            .entry(product.store_owner_id)
            .or_default()
            .push(OrderItem {
                product_id: product.id,
                title: product.title.clone(),
                price: product.price,
                quantity: line.quantity,
                color: line.color.clone(),
                size: line.size.clone(),
            });
    }

    Ok(by_store
        .into_iter()
        .map(|(store_owner_id, items)| OrderDraft {
            store_owner_id,
            items,
        })
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::aggregate::{CartItem, ProductCounters, RatingSummary};
    use crate::model::Sku;
    use crate::types::Category;

    fn product(id: i64, store: i64, price: Decimal, stock: u32) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            store_owner_id: UserId::new(store),
            title: format!("Product {id}"),
            description: String::new(),
            sku: Sku::parse(&format!("P{id}")).unwrap(),
            price,
            compare_price: None,
            stock,
            category: Category::Other,
            status: ProductStatus::Active,
            counters: ProductCounters::default(),
            rating: RatingSummary::empty(),
            created_at: now,
            updated_at: now,
        }
    }

    fn cart(lines: &[(i64, u32)]) -> CartItems {
        CartItems::from_entries(lines.iter().map(|&(id, qty)| {
            CartItem::new(ProductId::new(id), Quantity::new(qty).unwrap())
        }))
    }

    #[test]
    fn test_item_total() {
        let item = OrderItem {
            product_id: ProductId::new(1),
            title: "x".into(),
            price: Decimal::new(1250, 2),
            quantity: Quantity::new(3).unwrap(),
            color: None,
            size: None,
        };
        assert_eq!(item.total(), Decimal::new(3750, 2));
    }

    #[test]
    fn test_plan_groups_by_store() {
        let products = vec![
            product(1, 20, Decimal::new(10, 0), 5),
            product(2, 10, Decimal::new(3, 0), 5),
            product(3, 20, Decimal::new(7, 0), 5),
        ];
        let drafts = plan_checkout(&cart(&[(1, 2), (2, 1), (3, 1)]), &products).unwrap();

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].store_owner_id, UserId::new(10));
        assert_eq!(drafts[0].total(), Decimal::new(3, 0));
        assert_eq!(drafts[1].store_owner_id, UserId::new(20));
        assert_eq!(drafts[1].items.len(), 2);
        assert_eq!(drafts[1].total(), Decimal::new(27, 0));
    }

    #[test]
    fn test_plan_rejects_insufficient_stock() {
        let products = vec![product(1, 10, Decimal::ONE, 1)];
        let err = plan_checkout(&cart(&[(1, 2)]), &products).unwrap_err();
        assert_eq!(
            err,
            CheckoutError::InsufficientStock {
                product_id: ProductId::new(1),
                requested: 2,
                available: 1,
            }
        );
    }

    #[test]
    fn test_plan_rejects_empty_and_missing() {
        assert_eq!(
            plan_checkout(&CartItems::new(), &[]).unwrap_err(),
            CheckoutError::EmptyCart
        );
        assert_eq!(
            plan_checkout(&cart(&[(9, 1)]), &[]).unwrap_err(),
            CheckoutError::ProductNotFound(ProductId::new(9))
        );
    }

    #[test]
    fn test_plan_rejects_inactive_product() {
        let mut p = product(1, 10, Decimal::ONE, 5);
        p.status = ProductStatus::Inactive;
        assert_eq!(
            plan_checkout(&cart(&[(1, 1)]), &[p]).unwrap_err(),
            CheckoutError::Unavailable(ProductId::new(1))
        );
    }

    #[test]
    fn test_transition_rules() {
        let now = Utc::now();
        let mut order = Order {
            id: OrderId::new(1),
            customer_id: UserId::new(1),
            store_owner_id: UserId::new(2),
            items: Vec::new(),
            total_amount: Decimal::ZERO,
            payment_method: PaymentMethod::Card,
            status: OrderStatus::Pending,
            shipping_address: ShippingAddress::parse("12 Main Street").unwrap(),
            created_at: now,
            updated_at: now,
        };
        assert!(order.transition_to(OrderStatus::Shipped).is_err());
        assert_eq!(order.status, OrderStatus::Pending);
        order.transition_to(OrderStatus::Paid).unwrap();
        order.transition_to(OrderStatus::Shipped).unwrap();
        order.transition_to(OrderStatus::Delivered).unwrap();
        assert!(order.transition_to(OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn test_shipping_address_bounds() {
        assert!(ShippingAddress::parse(" abc ").is_err());
        assert!(ShippingAddress::parse("12 Main Street").is_ok());
    }
}
