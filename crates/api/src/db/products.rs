//! Product repository for database operations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use marketplace_core::aggregate::{Counter, ProductCounters, RatingScore, RatingSummary};
use marketplace_core::model::{NewProduct, Product, ProductUpdate, Sku};
use marketplace_core::{Category, ProductId, ProductStatus, UserId};

use super::{RepositoryError, non_negative_u32, non_negative_u64, to_i32, to_i64};

pub(crate) const PRODUCT_COLUMNS: &str = "id, store_owner_id, title, description, sku, price, \
     compare_price, stock, category, status, views, sales_count, rating_total, rating_count, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: ProductId,
    store_owner_id: UserId,
    title: String,
    description: String,
    sku: String,
    price: Decimal,
    compare_price: Option<Decimal>,
    stock: i32,
    category: Category,
    status: ProductStatus,
    views: i64,
    sales_count: i64,
    rating_total: Decimal,
    rating_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let sku = Sku::parse(&row.sku).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid sku in database: {e}"))
        })?;
        Ok(Self {
            id: row.id,
            store_owner_id: row.store_owner_id,
            title: row.title,
            description: row.description,
            sku,
            price: row.price,
            compare_price: row.compare_price,
            stock: non_negative_u32("stock", row.stock)?,
            category: row.category,
            status: row.status,
            counters: ProductCounters {
                views: Counter::from_raw(non_negative_u64("views", row.views)?),
                sales_count: Counter::from_raw(non_negative_u64("sales_count", row.sales_count)?),
            },
            rating: RatingSummary::from_parts(
                row.rating_total,
                non_negative_u32("rating_count", row.rating_count)?,
            ),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
    Popular,
}

impl ProductSort {
    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY created_at DESC, id DESC",
            Self::PriceAsc => " ORDER BY price ASC, id ASC",
            Self::PriceDesc => " ORDER BY price DESC, id DESC",
            Self::Rating => " ORDER BY rating_average DESC, rating_count DESC, id DESC",
            Self::Popular => " ORDER BY sales_count DESC, views DESC, id DESC",
        }
    }
}

/// Catalog filters. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<Category>,
    pub store_owner_id: Option<UserId>,
    pub status: Option<ProductStatus>,
    /// Leave out `inactive` products. Used for anonymous catalog views.
    pub hide_inactive: bool,
    /// Case-insensitive match on title, description or SKU.
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    pub sort: ProductSort,
}

impl ProductFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");
        if let Some(category) = self.category {
            qb.push(" AND category = ").push_bind(category);
        }
        if let Some(store) = self.store_owner_id {
            qb.push(" AND store_owner_id = ").push_bind(store);
        }
        if let Some(status) = self.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if self.hide_inactive {
            qb.push(" AND status <> ").push_bind(ProductStatus::Inactive);
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR sku ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(min) = self.min_price {
            qb.push(" AND price >= ").push_bind(min);
        }
        if let Some(max) = self.max_price {
            qb.push(" AND price <= ").push_bind(max);
        }
        match self.in_stock {
            Some(true) => {
                qb.push(" AND stock > 0");
            }
            Some(false) => {
                qb.push(" AND stock = 0");
            }
            None => {}
        }
    }
}

/// Escape `LIKE` wildcards in user input.
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Catalog figures reported on a store's statistics page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct StoreCatalogStats {
    pub product_count: i64,
    pub active_product_count: i64,
    pub out_of_stock_count: i64,
    pub total_views: i64,
}

/// A category with the number of products shoppers can see in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub product_count: u64,
}

/// Every category in display order, zero where nothing is listed.
fn all_categories(counts: &[(Category, i64)]) -> Result<Vec<CategoryCount>, RepositoryError> {
    Category::ALL
        .into_iter()
        .map(|category| {
            let count = counts
                .iter()
                .find(|(c, _)| *c == category)
                .map_or(0, |(_, n)| *n);
            Ok(CategoryCount {
                category,
                product_count: non_negative_u64("product count", count)?,
            })
        })
        .collect()
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `filter`, with the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM marketplace.products");
        filter.push_where(&mut count);
        let (total,) = count
            .build_query_as::<(i64,)>()
            .fetch_one(self.pool)
            .await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM marketplace.products"
        ));
        filter.push_where(&mut select);
        select
            .push(filter.sort.order_by())
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let products = select
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((products, total))
    }

    /// Catalog figures for one store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn store_stats(
        &self,
        store_owner_id: UserId,
    ) -> Result<StoreCatalogStats, RepositoryError> {
        let stats = sqlx::query_as::<_, StoreCatalogStats>(
            "SELECT COUNT(*) AS product_count, \
                    COUNT(*) FILTER (WHERE status = 'active') AS active_product_count, \
                    COUNT(*) FILTER (WHERE stock = 0) AS out_of_stock_count, \
                    COALESCE(SUM(views), 0)::BIGINT AS total_views \
             FROM marketplace.products WHERE store_owner_id = $1",
        )
        .bind(store_owner_id)
        .fetch_one(self.pool)
        .await?;
        Ok(stats)
    }

    /// Listed (not inactive) products per category, covering every category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn category_counts(&self) -> Result<Vec<CategoryCount>, RepositoryError> {
        let counts: Vec<(Category, i64)> = sqlx::query_as(
            "SELECT category, COUNT(*) FROM marketplace.products \
             WHERE status <> 'inactive' GROUP BY category",
        )
        .fetch_all(self.pool)
        .await?;
        all_categories(&counts)
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id, false).await
    }

    /// Whether a product exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM marketplace.products WHERE id = $1)")
                .bind(id)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Whether a product exists and is open to shoppers (any status but
    /// `inactive`).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_listed(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let (listed,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM marketplace.products \
             WHERE id = $1 AND status <> 'inactive')",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(listed)
    }

    /// Create a product for a store owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the store already uses the SKU.
    #[instrument(skip(self, product), fields(sku = %product.sku))]
    pub async fn create(
        &self,
        store_owner_id: UserId,
        product: &NewProduct,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO marketplace.products \
             (store_owner_id, title, description, sku, price, compare_price, stock, category, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(store_owner_id)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.sku.as_str())
        .bind(product.price)
        .bind(product.compare_price)
        .bind(to_i32("stock", product.stock)?)
        .bind(product.category)
        .bind(product.initial_status())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "SKU already used by this store"))?;

        let created = Product::try_from(row)?;
        tracing::info!(product_id = %created.id, %store_owner_id, "Product created");
        Ok(created)
    }

    /// Apply a partial edit to a locked product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Validation` if the edit breaks a field rule.
    /// Returns `RepositoryError::Conflict` if the new SKU is already used.
    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut product = fetch(&mut tx, id, true)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        update.apply(&mut product)?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE marketplace.products SET \
             title = $2, description = $3, sku = $4, price = $5, compare_price = $6, \
             stock = $7, category = $8, status = $9 \
             WHERE id = $1 \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.sku.as_str())
        .bind(product.price)
        .bind(product.compare_price)
        .bind(to_i32("stock", product.stock)?)
        .bind(product.category)
        .bind(product.status)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique(e, "SKU already used by this store"))?;

        tx.commit().await?;
        Product::try_from(row)
    }

    /// Record one view. The increment happens in a single `UPDATE`.
    ///
    /// Returns the new view count, or `None` if the product does not exist or
    /// is inactive.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn increment_views(&self, id: ProductId) -> Result<Option<Counter>, RepositoryError> {
        let views: Option<(i64,)> = sqlx::query_as(
            "UPDATE marketplace.products SET views = views + 1 \
             WHERE id = $1 AND status <> 'inactive' RETURNING views",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        views
            .map(|(v,)| non_negative_u64("views", v).map(Counter::from_raw))
            .transpose()
    }

    /// Submit a customer's rating for a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the customer already rated it.
    #[instrument(skip(self))]
    pub async fn rate(
        &self,
        id: ProductId,
        customer_id: UserId,
        score: RatingScore,
    ) -> Result<RatingSummary, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut product = fetch(&mut tx, id, true)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        sqlx::query(
            "INSERT INTO marketplace.product_ratings (product_id, customer_id, rating) \
             VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(customer_id)
        .bind(score.value())
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique(e, "you have already rated this product"))?;

        let summary = product.rate(score);
        sqlx::query(
            "UPDATE marketplace.products \
             SET rating_total = $2, rating_count = $3, rating_average = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(summary.total())
        .bind(to_i32("rating_count", summary.count())?)
        .bind(summary.average())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(
            product_id = %id,
            average = %summary.average(),
            count = summary.count(),
            "Product rated"
        );
        Ok(summary)
    }
}

/// Load a product, optionally `FOR UPDATE`.
async fn fetch(
    conn: &mut PgConnection,
    id: ProductId,
    lock: bool,
) -> Result<Option<Product>, RepositoryError> {
    let suffix = if lock { " FOR UPDATE" } else { "" };
    sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM marketplace.products WHERE id = $1{suffix}"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .map(Product::try_from)
    .transpose()
}

/// Lock several products in ID order.
pub(crate) async fn fetch_many_for_update(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<Vec<Product>, RepositoryError> {
    let ids: Vec<i64> = ids.iter().map(ProductId::as_i64).collect();
    sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM marketplace.products \
         WHERE id = ANY($1) ORDER BY id FOR UPDATE"
    ))
    .bind(&ids)
    .fetch_all(conn)
    .await?
    .into_iter()
    .map(Product::try_from)
    .collect()
}

/// Write the stock, status and sales counter of a product changed by checkout.
pub(crate) async fn save_sale(
    conn: &mut PgConnection,
    product: &Product,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE marketplace.products SET stock = $2, status = $3, sales_count = $4 WHERE id = $1",
    )
    .bind(product.id)
    .bind(to_i32("stock", product.stock)?)
    .bind(product.status)
    .bind(to_i64("sales_count", product.counters.sales_count.value())?)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("shirt"), "shirt");
    }

    #[test]
    fn test_filter_sql() {
        let filter = ProductFilter {
            category: Some(Category::Men),
            status: Some(ProductStatus::Active),
            search: Some("  linen ".into()),
            in_stock: Some(true),
            ..ProductFilter::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM marketplace.products");
        filter.push_where(&mut qb);
        let sql = qb.sql();
        assert!(sql.contains("category = $1"));
        assert!(sql.contains("status = $2"));
        assert!(sql.contains("title ILIKE $3"));
        assert!(sql.contains("stock > 0"));
        assert!(!sql.contains("price >="));
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let filter = ProductFilter {
            search: Some("   ".into()),
            ..ProductFilter::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1");
        filter.push_where(&mut qb);
        assert!(!qb.sql().contains("ILIKE"));
    }

    #[test]
    fn test_sort_from_query_value() {
        let sort: ProductSort = serde_json::from_str("\"price_asc\"").unwrap_or_default();
        assert_eq!(sort, ProductSort::PriceAsc);
        assert!(ProductSort::Rating.order_by().contains("rating_average"));
    }

    #[test]
    fn test_every_category_is_reported() {
        let counts = all_categories(&[(Category::Kids, 3), (Category::Men, 1)]).unwrap();
        assert_eq!(counts.len(), Category::ALL.len());
        assert_eq!(counts[0], CategoryCount { category: Category::Men, product_count: 1 });
        assert_eq!(counts[2].product_count, 3);
        assert_eq!(counts[4].category, Category::Other);
        assert_eq!(counts[4].product_count, 0);

        let body = serde_json::to_value(counts[2]).unwrap();
        assert_eq!(body["category"], "kids");
    }
}
