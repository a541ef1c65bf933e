//! Wishlist route handlers. Customers only.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use marketplace_core::aggregate::{AddOutcome, ClearOutcome, RemoveOutcome};
use marketplace_core::ProductId;

use crate::db::wishlists::WishlistView;
use crate::db::{ProductRepository, WishlistRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::routes::require_customer;
use crate::state::AppState;

/// Build the wishlist router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/wishlist", get(show).delete(clear))
        .route("/wishlist/items", post(add_item))
        .route(
            "/wishlist/items/{product_id}",
            get(contains).delete(remove_item),
        )
}

/// An operation's outcome plus the wishlist after it.
#[derive(Debug, Serialize)]
pub struct WishlistResponse<O: Serialize> {
    #[serde(flatten)]
    pub outcome: O,
    pub wishlist: WishlistView,
}

/// Save-product request body.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
}

/// The caller's saved products.
///
/// # Errors
///
/// Returns 403 for non-customers.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<WishlistView>> {
    require_customer(&current)?;
    Ok(Json(
        WishlistRepository::new(state.pool()).view(current.id).await?,
    ))
}

/// Save a product. Saving it twice reports `added: false`.
///
/// # Errors
///
/// Returns 404 if the product does not exist or is inactive.
pub async fn add_item(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<WishlistResponse<AddOutcome>>> {
    require_customer(&current)?;
    if !ProductRepository::new(state.pool())
        .is_listed(body.product_id)
        .await?
    {
        return Err(AppError::NotFound("Product".to_string()));
    }
    let wishlists = WishlistRepository::new(state.pool());
    let outcome = wishlists.add(current.id, body.product_id).await?;
    Ok(Json(WishlistResponse {
        outcome,
        wishlist: wishlists.view(current.id).await?,
    }))
}

/// Whether a product is saved.
///
/// # Errors
///
/// Returns 403 for non-customers.
pub async fn contains(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<serde_json::Value>> {
    require_customer(&current)?;
    let saved = WishlistRepository::new(state.pool())
        .has(current.id, product_id)
        .await?;
    Ok(Json(json!({ "product_id": product_id, "in_wishlist": saved })))
}

/// Unsave a product.
///
/// # Errors
///
/// Returns 403 for non-customers.
pub async fn remove_item(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<WishlistResponse<RemoveOutcome>>> {
    require_customer(&current)?;
    let wishlists = WishlistRepository::new(state.pool());
    let outcome = wishlists.remove(current.id, product_id).await?;
    Ok(Json(WishlistResponse {
        outcome,
        wishlist: wishlists.view(current.id).await?,
    }))
}

/// Empty the wishlist.
///
/// # Errors
///
/// Returns 403 for non-customers.
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<WishlistResponse<ClearOutcome>>> {
    require_customer(&current)?;
    let wishlists = WishlistRepository::new(state.pool());
    let outcome = wishlists.clear(current.id).await?;
    Ok(Json(WishlistResponse {
        outcome,
        wishlist: wishlists.view(current.id).await?,
    }))
}
