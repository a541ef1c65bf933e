//! Product comment route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;

use marketplace_core::model::{Comment, CommentContent, CommentThread};
use marketplace_core::{CommentId, ProductId};

use crate::db::{CommentRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::routes::require_owner_or_admin;
use crate::state::AppState;

/// Build the comments router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products/{id}/comments", get(list).post(create))
        .route("/comments/{id}", get(show).patch(edit).delete(remove))
}

/// New comment or reply.
#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
}

async fn ensure_product(state: &AppState, id: ProductId) -> Result<()> {
    if ProductRepository::new(state.pool()).exists(id).await? {
        Ok(())
    } else {
        Err(AppError::NotFound("Product".to_string()))
    }
}

/// Comment threads of a product.
///
/// # Errors
///
/// Returns 404 if the product does not exist.
pub async fn list(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Vec<CommentThread>>> {
    ensure_product(&state, id).await?;
    let threads = CommentRepository::new(state.pool())
        .list_for_product(id)
        .await?;
    Ok(Json(threads))
}

/// Post a comment, or reply to one with `parent_id`.
///
/// # Errors
///
/// Returns 400 for empty content or a reply to a reply, 404 if the product or
/// parent does not exist or the product is inactive.
#[tracing::instrument(skip(state, current, body))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<ProductId>,
    Json(body): Json<CommentRequest>,
) -> Result<impl IntoResponse> {
    if !ProductRepository::new(state.pool()).is_listed(id).await? {
        return Err(AppError::NotFound("Product".to_string()));
    }
    let content = CommentContent::parse(&body.content)?;
    let comment = CommentRepository::new(state.pool())
        .create(id, current.id, &content, body.parent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Edited comment body.
#[derive(Debug, Deserialize)]
pub struct CommentEdit {
    pub content: String,
}

/// One comment.
///
/// # Errors
///
/// Returns 404 if the comment does not exist.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<CommentId>,
) -> Result<Json<Comment>> {
    CommentRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Comment".to_string()))
}

/// Edit a comment's content. Author or admin.
///
/// # Errors
///
/// Returns 400 for empty or overlong content, 403 for anyone else, 404 if the
/// comment does not exist.
#[tracing::instrument(skip(state, current, body))]
pub async fn edit(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<CommentId>,
    Json(body): Json<CommentEdit>,
) -> Result<Json<Comment>> {
    let comments = CommentRepository::new(state.pool());
    let comment = comments
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment".to_string()))?;
    require_owner_or_admin(&current, comment.author_id)?;

    let content = CommentContent::parse(&body.content)?;
    let updated = comments.update_content(id, &content).await?;
    tracing::info!(edited_by = %current.id, "Comment edited");
    Ok(Json(updated))
}

/// Delete a comment and its replies. Author or admin.
///
/// # Errors
///
/// Returns 403 for anyone else, 404 if the comment does not exist.
#[tracing::instrument(skip(state, current))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<CommentId>,
) -> Result<StatusCode> {
    let comments = CommentRepository::new(state.pool());
    let comment = comments
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment".to_string()))?;
    require_owner_or_admin(&current, comment.author_id)?;

    comments.delete(id).await?;
    tracing::info!(deleted_by = %current.id, "Comment deleted");
    Ok(StatusCode::NO_CONTENT)
}
