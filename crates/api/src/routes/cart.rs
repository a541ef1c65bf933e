//! Shopping cart and checkout route handlers. Customers only.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};

use marketplace_core::aggregate::{AddOutcome, CartItem, ClearOutcome, Quantity, RemoveOutcome};
use marketplace_core::model::{Order, ShippingAddress};
use marketplace_core::{PaymentMethod, ProductId};

use crate::db::carts::CartView;
use crate::db::{CartRepository, OrderRepository, ProductRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::routes::require_customer;
use crate::state::AppState;

/// Build the cart router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(show).delete(clear))
        .route("/cart/items", post(add_item))
        .route(
            "/cart/items/{product_id}",
            patch(update_item).delete(remove_item),
        )
        .route("/cart/checkout", post(checkout))
}

/// An operation's outcome plus the cart after it.
#[derive(Debug, Serialize)]
pub struct CartResponse<O: Serialize> {
    #[serde(flatten)]
    pub outcome: O,
    pub cart: CartView,
}

const fn default_quantity() -> u32 {
    1
}

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

impl AddItemRequest {
    fn into_item(self) -> Result<CartItem> {
        let quantity = Quantity::new(self.quantity)?;
        Ok(CartItem::new(self.product_id, quantity).with_variant(self.color, self.size))
    }
}

/// Quantity update body. Zero removes the line.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

/// Checkout request body.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
}

async fn view(state: &AppState, current: CurrentUser) -> Result<CartView> {
    Ok(CartRepository::new(state.pool()).view(current.id).await?)
}

/// The caller's cart with line and cart totals.
///
/// # Errors
///
/// Returns 403 for non-customers.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<CartView>> {
    require_customer(&current)?;
    Ok(Json(view(&state, current).await?))
}

/// Add a product. Adding one already in the cart adds to its quantity.
///
/// # Errors
///
/// Returns 400 for a zero quantity, 404 if the product does not exist or is
/// inactive.
#[tracing::instrument(skip(state, current, body), fields(product_id = %body.product_id))]
pub async fn add_item(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<CartResponse<AddOutcome>>> {
    require_customer(&current)?;
    let product_id = body.product_id;
    let item = body.into_item()?;
    if !ProductRepository::new(state.pool()).is_listed(product_id).await? {
        return Err(AppError::NotFound("Product".to_string()));
    }

    let outcome = CartRepository::new(state.pool())
        .add(current.id, item)
        .await?;
    add_breadcrumb(
        "cart",
        "Added product",
        Some(&[("product_id", &product_id.to_string())]),
    );
    Ok(Json(CartResponse {
        outcome,
        cart: view(&state, current).await?,
    }))
}

/// Set a line's quantity.
///
/// # Errors
///
/// Returns 404 if the product is not in the cart.
pub async fn update_item(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(product_id): Path<ProductId>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<CartView>> {
    require_customer(&current)?;
    let found = CartRepository::new(state.pool())
        .set_quantity(current.id, product_id, body.quantity)
        .await?;
    if !found {
        return Err(AppError::NotFound("Cart item".to_string()));
    }
    Ok(Json(view(&state, current).await?))
}

/// Remove a product from the cart. Removing an absent product reports
/// `removed: false`.
///
/// # Errors
///
/// Returns 403 for non-customers.
pub async fn remove_item(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartResponse<RemoveOutcome>>> {
    require_customer(&current)?;
    let outcome = CartRepository::new(state.pool())
        .remove(current.id, product_id)
        .await?;
    Ok(Json(CartResponse {
        outcome,
        cart: view(&state, current).await?,
    }))
}

/// Empty the cart.
///
/// # Errors
///
/// Returns 403 for non-customers.
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<CartResponse<ClearOutcome>>> {
    require_customer(&current)?;
    let outcome = CartRepository::new(state.pool()).clear(current.id).await?;
    Ok(Json(CartResponse {
        outcome,
        cart: view(&state, current).await?,
    }))
}

/// Turn the cart into one order per store.
///
/// # Errors
///
/// Returns 400 for an empty cart or address, 404 if a product vanished, 409 if
/// a product is unavailable or short on stock.
#[tracing::instrument(skip(state, current, body))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(body): Json<CheckoutRequest>,
) -> Result<impl IntoResponse> {
    require_customer(&current)?;
    let address = ShippingAddress::parse(&body.shipping_address)?;

    let orders: Vec<Order> = OrderRepository::new(state.pool())
        .checkout(current.id, body.payment_method, &address)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, customer_id = %current.id, "Checkout failed"))?;
    add_breadcrumb("checkout", "Placed orders", None);

    Ok((StatusCode::CREATED, Json(orders)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_request_defaults_to_one() {
        let body: AddItemRequest =
            serde_json::from_value(serde_json::json!({ "product_id": 3 })).unwrap();
        let item = body.into_item().unwrap();
        assert_eq!(item.quantity.get(), 1);
        assert!(item.color.is_none());
    }

    #[test]
    fn test_add_request_rejects_zero() {
        let body: AddItemRequest =
            serde_json::from_value(serde_json::json!({ "product_id": 3, "quantity": 0 }))
                .unwrap();
        assert!(matches!(body.into_item(), Err(AppError::Aggregate(_))));
    }

    #[test]
    fn test_checkout_request_parses_payment_method() {
        let body: CheckoutRequest = serde_json::from_value(serde_json::json!({
            "payment_method": "cash_on_delivery",
            "shipping_address": "12 Valiasr St, Tehran"
        }))
        .unwrap();
        assert_eq!(body.payment_method, PaymentMethod::CashOnDelivery);
    }
}
