//! Wishlist repository for database operations.
//!
//! Same locking pattern as the cart: upsert and lock the `wishlists` row, run
//! the core operation, write back the difference.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use marketplace_core::aggregate::{
    AddOutcome, ClearOutcome, RemoveOutcome, WishlistItem, WishlistItems,
};
use marketplace_core::{ProductId, ProductStatus, UserId, WishlistId};

use super::RepositoryError;

/// A saved product with its current catalog details.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WishlistEntry {
    pub product_id: ProductId,
    pub added_at: DateTime<Utc>,
    pub title: String,
    pub price: Decimal,
    pub status: ProductStatus,
}

/// A customer's wishlist as shown to them.
#[derive(Debug, Clone, Serialize)]
pub struct WishlistView {
    pub items: Vec<WishlistEntry>,
    pub count: usize,
}

/// Repository for wishlist database operations.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    /// Create a new wishlist repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The customer's wishlist with product details.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn view(&self, customer_id: UserId) -> Result<WishlistView, RepositoryError> {
        let items = sqlx::query_as::<_, WishlistEntry>(
            "SELECT wi.product_id, wi.added_at, p.title, p.price, p.status \
             FROM marketplace.wishlists w \
             JOIN marketplace.wishlist_items wi ON wi.wishlist_id = w.id \
             JOIN marketplace.products p ON p.id = wi.product_id \
             WHERE w.customer_id = $1 \
             ORDER BY wi.added_at, wi.product_id",
        )
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        Ok(WishlistView {
            count: items.len(),
            items,
        })
    }

    /// Whether the product is in the customer's wishlist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has(
        &self,
        customer_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let (found,): (bool,) = sqlx::query_as(
            "SELECT EXISTS( \
                SELECT 1 FROM marketplace.wishlists w \
                JOIN marketplace.wishlist_items wi ON wi.wishlist_id = w.id \
                WHERE w.customer_id = $1 AND wi.product_id = $2)",
        )
        .bind(customer_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;
        Ok(found)
    }

    /// Save a product. Saving it twice reports `added = false`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        customer_id: UserId,
        product_id: ProductId,
    ) -> Result<AddOutcome, RepositoryError> {
        self.modify(customer_id, |list| list.add(WishlistItem::new(product_id)))
            .await
    }

    /// Remove a saved product.
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
        self.modify(customer_id, |list| list.remove(product_id))
            .await
    }

    /// Remove every saved product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn clear(&self, customer_id: UserId) -> Result<ClearOutcome, RepositoryError> {
        self.modify(customer_id, WishlistItems::clear).await
    }

    async fn modify<T, F>(&self, customer_id: UserId, change: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut WishlistItems) -> T + Send,
        T: Send,
    {
        let mut tx = self.pool.begin().await?;
        let wishlist_id = lock_wishlist(&mut tx, customer_id).await?;
        let before = load_items(&mut tx, wishlist_id).await?;

        let mut after = before.clone();
        let outcome = change(&mut after);

        persist(&mut tx, wishlist_id, &before, &after).await?;
        tx.commit().await?;
        Ok(outcome)
    }
}

async fn lock_wishlist(
    conn: &mut PgConnection,
    customer_id: UserId,
) -> Result<WishlistId, RepositoryError> {
    let (id,): (WishlistId,) = sqlx::query_as(
        "INSERT INTO marketplace.wishlists (customer_id) VALUES ($1) \
         ON CONFLICT (customer_id) DO UPDATE SET updated_at = NOW() \
         RETURNING id",
    )
    .bind(customer_id)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

async fn load_items(
    conn: &mut PgConnection,
    wishlist_id: WishlistId,
) -> Result<WishlistItems, RepositoryError> {
    let rows: Vec<(ProductId, DateTime<Utc>)> = sqlx::query_as(
        "SELECT product_id, added_at FROM marketplace.wishlist_items \
         WHERE wishlist_id = $1 ORDER BY added_at, product_id",
    )
    .bind(wishlist_id)
    .fetch_all(conn)
    .await?;

    Ok(WishlistItems::from_entries(rows.into_iter().map(
        |(product_id, added_at)| WishlistItem {
            product_id,
            added_at,
        },
    )))
}

async fn persist(
    conn: &mut PgConnection,
    wishlist_id: WishlistId,
    before: &WishlistItems,
    after: &WishlistItems,
) -> Result<(), RepositoryError> {
    if after.is_empty() {
        if !before.is_empty() {
            sqlx::query("DELETE FROM marketplace.wishlist_items WHERE wishlist_id = $1")
                .bind(wishlist_id)
                .execute(&mut *conn)
                .await?;
        }
        return Ok(());
    }

    for old in before.entries() {
        if !after.has(old.product_id) {
            sqlx::query(
                "DELETE FROM marketplace.wishlist_items \
                 WHERE wishlist_id = $1 AND product_id = $2",
            )
            .bind(wishlist_id)
            .bind(old.product_id)
            .execute(&mut *conn)
            .await?;
        }
    }

    for item in after.entries() {
        if before.has(item.product_id) {
            continue;
        }
        sqlx::query(
            "INSERT INTO marketplace.wishlist_items (wishlist_id, product_id, added_at) \
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(wishlist_id)
        .bind(item.product_id)
        .bind(item.added_at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
