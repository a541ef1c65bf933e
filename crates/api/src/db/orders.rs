//! Order repository: checkout and the order lifecycle.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use marketplace_core::aggregate::{CartItems, Counter, Quantity, StoreCounters};
use marketplace_core::model::{
    CheckoutError, Order, OrderDraft, OrderItem, ShippingAddress, plan_checkout,
};
use marketplace_core::{OrderId, OrderStatus, PaymentMethod, ProductId, UserId};

use super::{RepositoryError, carts, non_negative_u32, non_negative_u64, products, to_i32, to_i64};

const ORDER_COLUMNS: &str = "id, customer_id, store_owner_id, total_amount, payment_method, \
     status, shipping_address, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    customer_id: UserId,
    store_owner_id: UserId,
    total_amount: Decimal,
    payment_method: PaymentMethod,
    status: OrderStatus,
    shipping_address: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let shipping_address = ShippingAddress::parse(&self.shipping_address).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid shipping address: {e}"))
        })?;
        Ok(Order {
            id: self.id,
            customer_id: self.customer_id,
            store_owner_id: self.store_owner_id,
            items,
            total_amount: self.total_amount,
            payment_method: self.payment_method,
            status: self.status,
            shipping_address,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: OrderId,
    product_id: ProductId,
    title: String,
    price: Decimal,
    quantity: i32,
    color: Option<String>,
    size: Option<String>,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity = Quantity::new(non_negative_u32("quantity", row.quantity)?)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        Ok(Self {
            product_id: row.product_id,
            title: row.title,
            price: row.price,
            quantity,
            color: row.color,
            size: row.size,
        })
    }
}

/// Which orders a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    /// Orders placed by a customer.
    Customer(UserId),
    /// Orders placed against a store.
    Store(UserId),
    /// Every order.
    All,
}

impl OrderScope {
    const fn filter(self) -> (&'static str, Option<UserId>) {
        match self {
            Self::Customer(id) => (" WHERE customer_id = $1", Some(id)),
            Self::Store(id) => (" WHERE store_owner_id = $1", Some(id)),
            Self::All => ("", None),
        }
    }
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Turn the customer's cart into one order per store.
    ///
    /// Runs in one transaction holding, in this order, the cart row, every
    /// product in the cart and every store involved. Stock is decremented,
    /// product and store sales counters are bumped and the cart is emptied.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Checkout` for an empty cart, a missing or
    /// unavailable product, or insufficient stock. Nothing is written then.
    #[instrument(skip(self, shipping_address))]
    pub async fn checkout(
        &self,
        customer_id: UserId,
        payment_method: PaymentMethod,
        shipping_address: &ShippingAddress,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let cart_id = carts::lock_cart(&mut tx, customer_id).await?;
        let cart = carts::load_items(&mut tx, cart_id).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart.into());
        }

        let ids: Vec<ProductId> = cart.entries().iter().map(|i| i.product_id).collect();
        let mut products = products::fetch_many_for_update(&mut tx, &ids).await?;
        let drafts = plan_checkout(&cart, &products)?;

        for product in &mut products {
            let Some(line) = cart.get(product.id) else {
                continue;
            };
            product.stock = product.stock.saturating_sub(line.quantity.get());
            product.counters = product.counters.increment_sales();
            product.sync_stock_status();
            products::save_sale(&mut tx, product).await?;
        }

        let store_ids: Vec<UserId> = drafts.iter().map(|d| d.store_owner_id).collect();
        let mut stores = lock_store_counters(&mut tx, &store_ids).await?;

        let mut orders = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let total = draft.total();
            let counters = stores
                .get_mut(&draft.store_owner_id)
                .ok_or(RepositoryError::NotFound)?;
            *counters = counters.increment_sales(total)?;

            let order = insert_order(
                &mut tx,
                customer_id,
                draft,
                total,
                payment_method,
                shipping_address,
            )
            .await?;
            orders.push(order);
        }

        for (store_owner_id, counters) in &stores {
            save_store_counters(&mut tx, *store_owner_id, counters).await?;
        }

        carts::persist(&mut tx, cart_id, &cart, &CartItems::new()).await?;

        tx.commit().await?;

        tracing::info!(
            %customer_id,
            orders = orders.len(),
            "Checkout completed"
        );
        Ok(orders)
    }

    /// List orders in a scope, newest first, with the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        scope: OrderScope,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let (filter, owner) = scope.filter();
        let (limit_param, offset_param) = if owner.is_some() { (2, 3) } else { (1, 2) };

        let count_sql = format!("SELECT COUNT(*) FROM marketplace.orders{filter}");
        let mut count = sqlx::query_as::<_, (i64,)>(&count_sql);
        if let Some(owner) = owner {
            count = count.bind(owner);
        }
        let (total,) = count.fetch_one(self.pool).await?;

        let select_sql = format!(
            "SELECT {ORDER_COLUMNS} FROM marketplace.orders{filter} \
             ORDER BY created_at DESC, id DESC LIMIT ${limit_param} OFFSET ${offset_param}"
        );
        let mut select = sqlx::query_as::<_, OrderRow>(&select_sql);
        if let Some(owner) = owner {
            select = select.bind(owner);
        }
        let rows = select.bind(limit).bind(offset).fetch_all(self.pool).await?;

        let mut conn = self.pool.acquire().await?;
        let orders = attach_items(&mut conn, rows).await?;
        Ok((orders, total))
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id, false).await
    }

    /// Move an order along its lifecycle.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Transition` if the move is not allowed.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut order = fetch(&mut tx, id, true)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let from = order.status;

        order.transition_to(next)?;

        let (updated_at,): (DateTime<Utc>,) = sqlx::query_as(
            "UPDATE marketplace.orders SET status = $2 WHERE id = $1 RETURNING updated_at",
        )
        .bind(id)
        .bind(order.status)
        .fetch_one(&mut *tx)
        .await?;
        order.updated_at = updated_at;

        tx.commit().await?;
        tracing::info!(order_id = %id, %from, to = %next, "Order status changed");
        Ok(order)
    }
}

async fn fetch(
    conn: &mut PgConnection,
    id: OrderId,
    lock: bool,
) -> Result<Option<Order>, RepositoryError> {
    let suffix = if lock { " FOR UPDATE" } else { "" };
    let Some(row) = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM marketplace.orders WHERE id = $1{suffix}"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    else {
        return Ok(None);
    };

    let mut orders = attach_items(conn, vec![row]).await?;
    Ok(orders.pop())
}

/// Load the items of every order in one query.
async fn attach_items(
    conn: &mut PgConnection,
    rows: Vec<OrderRow>,
) -> Result<Vec<Order>, RepositoryError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = rows.iter().map(|r| r.id.as_i64()).collect();
    let item_rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT order_id, product_id, title, price, quantity, color, size \
         FROM marketplace.order_items WHERE order_id = ANY($1) ORDER BY id",
    )
    .bind(&ids)
    .fetch_all(conn)
    .await?;

    let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for row in item_rows {
        let order_id = row.order_id;
        by_order
            .entry(order_id)
            .or_default()
            .push(OrderItem::try_from(row)?);
    }

    rows.into_iter()
        .map(|row| {
            let items = by_order.remove(&row.id).unwrap_or_default();
            row.into_order(items)
        })
        .collect()
}

async fn insert_order(
    conn: &mut PgConnection,
    customer_id: UserId,
    draft: OrderDraft,
    total: Decimal,
    payment_method: PaymentMethod,
    shipping_address: &ShippingAddress,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "INSERT INTO marketplace.orders \
         (customer_id, store_owner_id, total_amount, payment_method, shipping_address) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(customer_id)
    .bind(draft.store_owner_id)
    .bind(total)
    .bind(payment_method)
    .bind(shipping_address.as_str())
    .fetch_one(&mut *conn)
    .await?;

    for item in &draft.items {
        sqlx::query(
            "INSERT INTO marketplace.order_items \
             (order_id, product_id, title, price, quantity, color, size) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(row.id)
        .bind(item.product_id)
        .bind(&item.title)
        .bind(item.price)
        .bind(to_i32("quantity", item.quantity.get())?)
        .bind(item.color.as_deref())
        .bind(item.size.as_deref())
        .execute(&mut *conn)
        .await?;
    }

    row.into_order(draft.items)
}

async fn lock_store_counters(
    conn: &mut PgConnection,
    store_ids: &[UserId],
) -> Result<HashMap<UserId, StoreCounters>, RepositoryError> {
    let ids: Vec<i64> = store_ids.iter().map(UserId::as_i64).collect();
    let rows: Vec<(UserId, i64, Decimal)> = sqlx::query_as(
        "SELECT user_id, total_sales, total_revenue FROM marketplace.store_profiles \
         WHERE user_id = ANY($1) ORDER BY user_id FOR UPDATE",
    )
    .bind(&ids)
    .fetch_all(conn)
    .await?;

    rows.into_iter()
        .map(|(id, total_sales, total_revenue)| {
            Ok((
                id,
                StoreCounters {
                    total_sales: Counter::from_raw(non_negative_u64("total_sales", total_sales)?),
                    total_revenue,
                },
            ))
        })
        .collect()
}

async fn save_store_counters(
    conn: &mut PgConnection,
    store_owner_id: UserId,
    counters: &StoreCounters,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE marketplace.store_profiles SET total_sales = $2, total_revenue = $3 \
         WHERE user_id = $1",
    )
    .bind(store_owner_id)
    .bind(to_i64("total_sales", counters.total_sales.value())?)
    .bind(counters.total_revenue)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_filter() {
        let (sql, owner) = OrderScope::Store(UserId::new(4)).filter();
        assert_eq!(sql, " WHERE store_owner_id = $1");
        assert_eq!(owner, Some(UserId::new(4)));

        let (sql, owner) = OrderScope::All.filter();
        assert!(sql.is_empty());
        assert!(owner.is_none());
    }

    #[test]
    fn test_row_with_bad_address_is_corruption() {
        let now = Utc::now();
        let row = OrderRow {
            id: OrderId::new(1),
            customer_id: UserId::new(2),
            store_owner_id: UserId::new(3),
            total_amount: Decimal::ZERO,
            payment_method: PaymentMethod::Card,
            status: OrderStatus::Pending,
            shipping_address: String::new(),
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(
            row.into_order(Vec::new()),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
