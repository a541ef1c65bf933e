//! Order route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use serde::Deserialize;

use marketplace_core::model::Order;
use marketplace_core::{OrderId, OrderStatus};

use crate::db::{OrderRepository, OrderScope};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{CurrentUser, Page, Pagination};
use crate::state::AppState;

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list))
        .route("/orders/{id}", get(show))
        .route("/orders/{id}/status", patch(update_status))
}

/// Status change request body.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

/// Orders the caller can see: everything for admins, incoming orders for
/// store owners, placed orders for customers.
fn scope_for(user: &CurrentUser) -> OrderScope {
    if user.is_admin() {
        OrderScope::All
    } else if user.is_store_owner() {
        OrderScope::Store(user.id)
    } else {
        OrderScope::Customer(user.id)
    }
}

fn can_view(user: &CurrentUser, order: &Order) -> bool {
    user.is_admin() || order.customer_id == user.id || order.store_owner_id == user.id
}

/// The selling store and admins may make any valid move; the buyer may only
/// cancel.
fn can_set_status(user: &CurrentUser, order: &Order, next: OrderStatus) -> bool {
    user.can_act_for(order.store_owner_id)
        || (order.customer_id == user.id && next == OrderStatus::Cancelled)
}

/// Orders visible to the caller, newest first.
///
/// # Errors
///
/// Returns 401 without a session.
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<Order>>> {
    let (orders, total) = OrderRepository::new(state.pool())
        .list(scope_for(&current), pagination.limit(), pagination.offset())
        .await?;
    Ok(Json(Page::new(orders, total, &pagination)))
}

async fn load_visible(state: &AppState, current: &CurrentUser, id: OrderId) -> Result<Order> {
    OrderRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|order| can_view(current, order))
        .ok_or_else(|| AppError::NotFound("Order".to_string()))
}

/// Order detail for its buyer, its store and admins.
///
/// # Errors
///
/// Returns 404 if the order does not exist or belongs to someone else.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(load_visible(&state, &current, id).await?))
}

/// Move an order along its lifecycle.
///
/// # Errors
///
/// Returns 403 when the caller may not make this change, 404 if the order is
/// not visible, 409 for a transition the lifecycle forbids.
#[tracing::instrument(skip(state, current, body))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Order>> {
    let order = load_visible(&state, &current, id).await?;
    if !can_set_status(&current, &order, body.status) {
        return Err(AppError::Forbidden(
            "you may not set this order status".to_string(),
        ));
    }

    let updated = OrderRepository::new(state.pool())
        .update_status(id, body.status)
        .await?;
    Ok(Json(updated))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use marketplace_core::model::ShippingAddress;
    use marketplace_core::{PaymentMethod, Role, UserId, UserType};
    use rust_decimal::Decimal;

    fn user(id: i64, role: Role, user_type: UserType) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            role,
            user_type,
        }
    }

    fn order() -> Order {
        Order {
            id: OrderId::new(1),
            customer_id: UserId::new(10),
            store_owner_id: UserId::new(20),
            items: Vec::new(),
            total_amount: Decimal::ZERO,
            payment_method: PaymentMethod::Card,
            status: OrderStatus::Pending,
            shipping_address: ShippingAddress::parse("1 Main St, Shiraz").unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_scope_by_role() {
        assert!(matches!(
            scope_for(&user(1, Role::Admin, UserType::Customer)),
            OrderScope::All
        ));
        assert!(matches!(
            scope_for(&user(2, Role::Customer, UserType::StoreOwner)),
            OrderScope::Store(id) if id == UserId::new(2)
        ));
        assert!(matches!(
            scope_for(&user(3, Role::Customer, UserType::Customer)),
            OrderScope::Customer(id) if id == UserId::new(3)
        ));
    }

    #[test]
    fn test_visibility() {
        let order = order();
        assert!(can_view(&user(10, Role::Customer, UserType::Customer), &order));
        assert!(can_view(&user(20, Role::Customer, UserType::StoreOwner), &order));
        assert!(!can_view(&user(11, Role::Customer, UserType::Customer), &order));
    }

    #[test]
    fn test_buyer_may_only_cancel() {
        let order = order();
        let buyer = user(10, Role::Customer, UserType::Customer);
        assert!(can_set_status(&buyer, &order, OrderStatus::Cancelled));
        assert!(!can_set_status(&buyer, &order, OrderStatus::Shipped));

        let seller = user(20, Role::Customer, UserType::StoreOwner);
        assert!(can_set_status(&seller, &order, OrderStatus::Paid));
    }
}
