//! Product gallery handlers.
//!
//! Uploads take the same bodies as profile images and store logos. Galleries
//! of inactive products are only visible to their store and admins.

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
};
use serde::Serialize;

use marketplace_core::aggregate::{ImageInfo, ImageSlot};
use marketplace_core::model::{Product, ProductImage};
use marketplace_core::{ProductId, ProductImageId};

use crate::db::{ProductImageRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::CurrentUser;
use crate::routes::images::{read_upload, stored_image_response};
use crate::routes::products::visible_to;
use crate::routes::require_owner_or_admin;
use crate::state::AppState;

/// Build the product gallery router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products/{id}/images", get(list).post(add))
        .route(
            "/products/{id}/images/{image_id}",
            get(show).delete(remove),
        )
        .route("/products/{id}/images/{image_id}/info", get(info))
        .route("/products/{id}/images/{image_id}/primary", put(make_primary))
}

/// Gallery state after a removal.
#[derive(Debug, Serialize)]
pub struct RemovedImage {
    pub removed: ProductImageId,
    /// Image that took over as primary, if the removed one was.
    pub promoted: Option<ProductImageId>,
}

async fn visible_product(
    state: &AppState,
    id: ProductId,
    viewer: Option<&CurrentUser>,
) -> Result<Product> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|p| visible_to(p, viewer))
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
}

async fn owned_product(state: &AppState, id: ProductId, current: &CurrentUser) -> Result<Product> {
    let product = ProductRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    require_owner_or_admin(current, product.store_owner_id)?;
    Ok(product)
}

/// A product's gallery in position order.
///
/// # Errors
///
/// Returns 404 if the product does not exist or is hidden.
pub async fn list(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(id): Path<ProductId>,
) -> Result<Json<Vec<ProductImage>>> {
    visible_product(&state, id, viewer.as_ref()).await?;
    Ok(Json(ProductImageRepository::new(state.pool()).list(id).await?))
}

/// Add an image to a product's gallery. Owning store owner or admin.
///
/// # Errors
///
/// Returns 400 for a body that does not match the storage mode, an invalid
/// image or a full gallery, 413 for an oversized payload, 403 when not
/// permitted, 404 if the product does not exist.
#[tracing::instrument(skip(state, current, request))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<ProductId>,
    request: Request,
) -> Result<impl IntoResponse> {
    owned_product(&state, id, &current).await?;

    let mut slot = ImageSlot::empty();
    read_upload(&state, request).await?.store_in(&mut slot)?;
    let image = slot
        .image()
        .ok_or_else(|| AppError::BadRequest("no image in upload".to_string()))?;

    let added = ProductImageRepository::new(state.pool())
        .add(id, image)
        .await?;
    Ok((StatusCode::CREATED, Json(added)))
}

/// Gallery image bytes, or a redirect to a linked image.
///
/// # Errors
///
/// Returns 404 if the product is hidden or the image is not in its gallery.
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Path((id, image_id)): Path<(ProductId, ProductImageId)>,
) -> Result<Response> {
    visible_product(&state, id, viewer.as_ref()).await?;
    let slot = ProductImageRepository::new(state.pool())
        .load(id, image_id)
        .await?;
    stored_image_response(slot.image())
}

/// Gallery image metadata.
///
/// # Errors
///
/// Returns 404 if the product is hidden or the image is not in its gallery.
pub async fn info(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Path((id, image_id)): Path<(ProductId, ProductImageId)>,
) -> Result<Json<ImageInfo>> {
    visible_product(&state, id, viewer.as_ref()).await?;
    ProductImageRepository::new(state.pool())
        .get(id, image_id)
        .await?
        .map(|image| Json(image.image))
        .ok_or_else(|| AppError::NotFound("Image".to_string()))
}

/// Make an image the product's primary image. Owning store owner or admin.
///
/// # Errors
///
/// Returns 403 when not permitted, 404 if the image is not in the gallery.
#[tracing::instrument(skip(state, current))]
pub async fn make_primary(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path((id, image_id)): Path<(ProductId, ProductImageId)>,
) -> Result<Json<ProductImage>> {
    owned_product(&state, id, &current).await?;
    let image = ProductImageRepository::new(state.pool())
        .set_primary(id, image_id)
        .await?;
    tracing::info!(product_id = %id, %image_id, "Primary image changed");
    Ok(Json(image))
}

/// Remove an image from the gallery. Owning store owner or admin.
///
/// # Errors
///
/// Returns 403 when not permitted, 404 if the image is not in the gallery.
#[tracing::instrument(skip(state, current))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path((id, image_id)): Path<(ProductId, ProductImageId)>,
) -> Result<Json<RemovedImage>> {
    owned_product(&state, id, &current).await?;
    let removal = ProductImageRepository::new(state.pool())
        .remove(id, image_id)
        .await?;
    Ok(Json(RemovedImage {
        removed: image_id,
        promoted: removal.promoted,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_image_names_promotion() {
        let body = serde_json::to_value(RemovedImage {
            removed: ProductImageId::new(4),
            promoted: Some(ProductImageId::new(5)),
        })
        .unwrap();
        assert_eq!(body["removed"], 4);
        assert_eq!(body["promoted"], 5);
    }
}
