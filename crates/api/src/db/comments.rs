//! Comment repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use marketplace_core::model::{Comment, CommentContent, CommentThread, build_threads};
use marketplace_core::{CommentId, ProductId, UserId};

use super::RepositoryError;

const COMMENT_SELECT: &str = "SELECT c.id, c.product_id, c.author_id, \
     u.first_name || ' ' || u.last_name AS author_name, \
     c.content, c.parent_id, c.created_at, c.updated_at \
     FROM marketplace.comments c \
     JOIN marketplace.users u ON u.id = c.author_id";

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: CommentId,
    product_id: ProductId,
    author_id: UserId,
    author_name: String,
    content: String,
    parent_id: Option<CommentId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CommentRow> for Comment {
    type Error = RepositoryError;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        let content = CommentContent::parse(&row.content)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid comment: {e}")))?;
        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            author_id: row.author_id,
            author_name: row.author_name,
            content,
            parent_id: row.parent_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for comment database operations.
pub struct CommentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CommentRepository<'a> {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Threads for a product, newest first, replies oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<CommentThread>, RepositoryError> {
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            "{COMMENT_SELECT} WHERE c.product_id = $1 \
             ORDER BY (c.parent_id IS NULL) DESC, \
             CASE WHEN c.parent_id IS NULL THEN c.created_at END DESC, \
             c.created_at ASC, c.id ASC"
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        let comments = rows
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(build_threads(comments))
    }

    /// Get a comment by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CommentId) -> Result<Option<Comment>, RepositoryError> {
        sqlx::query_as::<_, CommentRow>(&format!("{COMMENT_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(Comment::try_from)
            .transpose()
    }

    /// Post a comment, or a reply when `parent_id` is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the parent comment does not exist.
    /// Returns `RepositoryError::Validation` if the parent cannot take a reply
    /// on this product.
    #[instrument(skip(self, content))]
    pub async fn create(
        &self,
        product_id: ProductId,
        author_id: UserId,
        content: &CommentContent,
        parent_id: Option<CommentId>,
    ) -> Result<Comment, RepositoryError> {
        if let Some(parent_id) = parent_id {
            let parent = self.get(parent_id).await?.ok_or(RepositoryError::NotFound)?;
            parent.accepts_reply_on(product_id)?;
        }

        let (id,): (CommentId,) = sqlx::query_as(
            "INSERT INTO marketplace.comments (product_id, author_id, content, parent_id) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(product_id)
        .bind(author_id)
        .bind(content.as_str())
        .bind(parent_id)
        .fetch_one(self.pool)
        .await?;

        tracing::info!(comment_id = %id, %product_id, %author_id, "Comment posted");
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Replace a comment's content. Its place in the thread does not change.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the comment does not exist.
    #[instrument(skip(self, content))]
    pub async fn update_content(
        &self,
        id: CommentId,
        content: &CommentContent,
    ) -> Result<Comment, RepositoryError> {
        let result = sqlx::query("UPDATE marketplace.comments SET content = $2 WHERE id = $1")
            .bind(id)
            .bind(content.as_str())
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a comment and its replies.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the comment does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CommentId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM marketplace.comments WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
