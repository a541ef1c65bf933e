//! Cart repository for database operations.
//!
//! Each mutation upserts the customer's `carts` row, which also locks it for
//! the rest of the transaction, loads the lines into a [`CartItems`], runs the
//! core operation and writes back only the lines that changed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use marketplace_core::aggregate::{
    AddOutcome, CartItem, CartItems, ClearOutcome, Quantity, RemoveOutcome,
};
use marketplace_core::{CartId, ProductId, ProductStatus, UserId};

use super::{RepositoryError, non_negative_u32, to_i32};

#[derive(sqlx::FromRow)]
struct CartItemRow {
    product_id: ProductId,
    quantity: i32,
    color: Option<String>,
    size: Option<String>,
    added_at: DateTime<Utc>,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        let quantity = Quantity::new(non_negative_u32("quantity", row.quantity)?)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        Ok(Self {
            product_id: row.product_id,
            quantity,
            color: row.color,
            size: row.size,
            added_at: row.added_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    #[sqlx(flatten)]
    item: CartItemRow,
    title: String,
    price: Decimal,
    stock: i32,
    status: ProductStatus,
}

/// One cart line joined with its product.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: CartItem,
    pub title: String,
    pub price: Decimal,
    pub line_total: Decimal,
    pub available_stock: u32,
    /// Active and stocked for the requested quantity.
    pub is_available: bool,
}

/// A customer's cart as shown to them.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    /// Distinct products.
    pub count: usize,
    /// Units across every line.
    pub total_quantity: u64,
    pub subtotal: Decimal,
}

impl CartView {
    fn from_lines(lines: Vec<CartLine>) -> Self {
        let items = CartItems::from_entries(lines.iter().map(|line| line.item.clone()));
        let subtotal = lines.iter().map(|line| line.line_total).sum();
        Self {
            count: items.count(),
            total_quantity: items.total_quantity(),
            subtotal,
            items: lines,
        }
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The customer's cart with product details. A customer without a cart
    /// row sees an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn view(&self, customer_id: UserId) -> Result<CartView, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            "SELECT ci.product_id, ci.quantity, ci.color, ci.size, ci.added_at, \
                    p.title, p.price, p.stock, p.status \
             FROM marketplace.carts c \
             JOIN marketplace.cart_items ci ON ci.cart_id = c.id \
             JOIN marketplace.products p ON p.id = ci.product_id \
             WHERE c.customer_id = $1 \
             ORDER BY ci.added_at, ci.product_id",
        )
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        let lines = rows
            .into_iter()
            .map(|row| {
                let item = CartItem::try_from(row.item)?;
                let available_stock = non_negative_u32("stock", row.stock)?;
                Ok(CartLine {
                    line_total: row.price * Decimal::from(item.quantity.get()),
                    is_available: row.status == ProductStatus::Active
                        && item.quantity.get() <= available_stock,
                    item,
                    title: row.title,
                    price: row.price,
                    available_stock,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(CartView::from_lines(lines))
    }

    /// Add a line, merging quantities if the product is already in the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self, item), fields(product_id = %item.product_id))]
    pub async fn add(
        &self,
        customer_id: UserId,
        item: CartItem,
    ) -> Result<AddOutcome, RepositoryError> {
        self.modify(customer_id, |cart| cart.add(item)).await
    }

    /// Replace a line's quantity; zero removes the line.
    ///
    /// Returns `false` if the product is not in the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        customer_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        self.modify(customer_id, |cart| cart.set_quantity(product_id, quantity))
            .await
    }

    /// Remove a product from the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn remove(
        &self,
        customer_id: UserId,
        product_id: ProductId,
    ) -> Result<RemoveOutcome, RepositoryError> {
        self.modify(customer_id, |cart| cart.remove(product_id))
            .await
    }

    /// Empty the cart. Clearing an empty cart succeeds.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn clear(&self, customer_id: UserId) -> Result<ClearOutcome, RepositoryError> {
        self.modify(customer_id, CartItems::clear).await
    }

    async fn modify<T, F>(&self, customer_id: UserId, change: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut CartItems) -> T + Send,
        T: Send,
    {
        let mut tx = self.pool.begin().await?;
        let cart_id = lock_cart(&mut tx, customer_id).await?;
        let before = load_items(&mut tx, cart_id).await?;

        let mut after = before.clone();
        let outcome = change(&mut after);

        persist(&mut tx, cart_id, &before, &after).await?;
        tx.commit().await?;
        Ok(outcome)
    }
}

/// Get or create the customer's cart and hold its row lock until the
/// transaction ends.
pub(crate) async fn lock_cart(
    conn: &mut PgConnection,
    customer_id: UserId,
) -> Result<CartId, RepositoryError> {
    let (id,): (CartId,) = sqlx::query_as(
        "INSERT INTO marketplace.carts (customer_id) VALUES ($1) \
         ON CONFLICT (customer_id) DO UPDATE SET updated_at = NOW() \
         RETURNING id",
    )
    .bind(customer_id)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Load the lines of a cart in the order they were added.
pub(crate) async fn load_items(
    conn: &mut PgConnection,
    cart_id: CartId,
) -> Result<CartItems, RepositoryError> {
    let rows = sqlx::query_as::<_, CartItemRow>(
        "SELECT product_id, quantity, color, size, added_at \
         FROM marketplace.cart_items WHERE cart_id = $1 \
         ORDER BY added_at, product_id",
    )
    .bind(cart_id)
    .fetch_all(conn)
    .await?;

    let items = rows
        .into_iter()
        .map(CartItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CartItems::from_entries(items))
}

/// Write the difference between two states of one cart.
pub(crate) async fn persist(
    conn: &mut PgConnection,
    cart_id: CartId,
    before: &CartItems,
    after: &CartItems,
) -> Result<(), RepositoryError> {
    if after.is_empty() {
        if !before.is_empty() {
            sqlx::query("DELETE FROM marketplace.cart_items WHERE cart_id = $1")
                .bind(cart_id)
                .execute(&mut *conn)
                .await?;
        }
        return Ok(());
    }

    for old in before.entries() {
        if !after.has(old.product_id) {
            sqlx::query("DELETE FROM marketplace.cart_items WHERE cart_id = $1 AND product_id = $2")
                .bind(cart_id)
                .bind(old.product_id)
                .execute(&mut *conn)
                .await?;
        }
    }

    for item in after.entries() {
        if before.get(item.product_id) == Some(item) {
            continue;
        }
        sqlx::query(
            "INSERT INTO marketplace.cart_items \
             (cart_id, product_id, quantity, color, size, added_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (cart_id, product_id) DO UPDATE SET \
             quantity = EXCLUDED.quantity, color = EXCLUDED.color, size = EXCLUDED.size",
        )
        .bind(cart_id)
        .bind(item.product_id)
        .bind(to_i32("quantity", item.quantity.get())?)
        .bind(item.color.as_deref())
        .bind(item.size.as_deref())
        .bind(item.added_at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i64, qty: u32, price: Decimal) -> CartLine {
        let item = CartItem::new(ProductId::new(id), Quantity::new(qty).unwrap());
        CartLine {
            line_total: price * Decimal::from(qty),
            item,
            title: format!("Product {id}"),
            price,
            available_stock: 10,
            is_available: true,
        }
    }

    #[test]
    fn test_view_totals() {
        let view = CartView::from_lines(vec![
            line(1, 2, Decimal::new(1050, 2)),
            line(2, 3, Decimal::new(200, 2)),
        ]);
        assert_eq!(view.count, 2);
        assert_eq!(view.total_quantity, 5);
        assert_eq!(view.subtotal, Decimal::new(2700, 2));
    }

    #[test]
    fn test_empty_view() {
        let view = CartView::from_lines(Vec::new());
        assert_eq!(view.count, 0);
        assert_eq!(view.subtotal, Decimal::ZERO);
    }

    #[test]
    fn test_line_serializes_flat() {
        let json = serde_json::to_value(line(7, 1, Decimal::new(999, 2))).unwrap();
        assert_eq!(json["product_id"], 7);
        assert_eq!(json["quantity"], 1);
        assert_eq!(json["line_total"], "9.99");
    }

    #[test]
    fn test_item_row_rejects_zero_quantity() {
        let row = CartItemRow {
            product_id: ProductId::new(1),
            quantity: 0,
            color: None,
            size: None,
            added_at: Utc::now(),
        };
        assert!(matches!(
            CartItem::try_from(row),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
