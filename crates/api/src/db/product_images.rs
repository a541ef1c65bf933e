//! Product gallery persistence.
//!
//! Gallery changes lock the product row first, then read the gallery, so two
//! uploads to one product cannot both become primary or overshoot the image
//! ceiling.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use marketplace_core::aggregate::{ImageSlot, StoredImage};
use marketplace_core::model::{Gallery, GalleryEntry, GalleryRemoval, ProductImage};
use marketplace_core::{ProductId, ProductImageId};

use super::images::{ImageColumns, ImageMetaRow, ImageRow};
use super::{RepositoryError, non_negative_u32};

const IMAGE_COLUMNS: &str = "id, product_id, is_primary, position, created_at, url, \
     content_type, filename, size, uploaded_at, (data IS NOT NULL) AS has_data";

#[derive(sqlx::FromRow)]
struct ProductImageRow {
    id: ProductImageId,
    product_id: ProductId,
    is_primary: bool,
    position: i32,
    created_at: DateTime<Utc>,
    #[sqlx(flatten)]
    meta: ImageMetaRow,
}

impl TryFrom<ProductImageRow> for ProductImage {
    type Error = RepositoryError;

    fn try_from(row: ProductImageRow) -> Result<Self, Self::Error> {
        let image = row.meta.into_info()?.ok_or_else(|| {
            RepositoryError::DataCorruption(format!("product image {} has no source", row.id))
        })?;
        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            is_primary: row.is_primary,
            position: non_negative_u32("image position", row.position)?,
            image,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GalleryEntryRow {
    id: ProductImageId,
    is_primary: bool,
}

/// Repository for product gallery operations.
pub struct ProductImageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductImageRepository<'a> {
    /// Create a new product image repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Gallery of a product in position order, without payloads.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, product_id: ProductId) -> Result<Vec<ProductImage>, RepositoryError> {
        sqlx::query_as::<_, ProductImageRow>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM marketplace.product_images \
             WHERE product_id = $1 ORDER BY position"
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(ProductImage::try_from)
        .collect()
    }

    /// Metadata of one gallery image.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get(
        &self,
        product_id: ProductId,
        id: ProductImageId,
    ) -> Result<Option<ProductImage>, RepositoryError> {
        sqlx::query_as::<_, ProductImageRow>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM marketplace.product_images \
             WHERE product_id = $1 AND id = $2"
        ))
        .bind(product_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .map(ProductImage::try_from)
        .transpose()
    }

    /// One gallery image with its payload.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the image is not in the gallery.
    #[instrument(skip(self))]
    pub async fn load(
        &self,
        product_id: ProductId,
        id: ProductImageId,
    ) -> Result<ImageSlot, RepositoryError> {
        let row = sqlx::query_as::<_, ImageRow>(
            "SELECT url, data, content_type, filename, uploaded_at \
             FROM marketplace.product_images WHERE product_id = $1 AND id = $2",
        )
        .bind(product_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into_slot())
    }

    /// Append an image. The first image of a gallery becomes primary.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Aggregate` if the gallery is full.
    #[instrument(skip(self, image))]
    pub async fn add(
        &self,
        product_id: ProductId,
        image: &StoredImage,
    ) -> Result<ProductImage, RepositoryError> {
        let columns = ImageColumns::of(Some(image))?;

        let mut tx = self.pool.begin().await?;
        let gallery = lock_gallery(&mut tx, product_id).await?;
        let is_primary = gallery.admit()?;

        let row = sqlx::query_as::<_, ProductImageRow>(&format!(
            "INSERT INTO marketplace.product_images \
             (product_id, url, data, content_type, filename, size, uploaded_at, is_primary, position) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, \
               (SELECT COALESCE(MAX(position), 0) + 1 \
                FROM marketplace.product_images WHERE product_id = $1)) \
             RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(product_id)
        .bind(columns.url)
        .bind(columns.data)
        .bind(columns.content_type)
        .bind(columns.filename)
        .bind(columns.size)
        .bind(columns.uploaded_at)
        .bind(is_primary)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        let added = ProductImage::try_from(row)?;
        tracing::info!(%product_id, image_id = %added.id, is_primary, "Product image added");
        Ok(added)
    }

    /// Make one image the product's only primary image.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist or
    /// the image is not in its gallery.
    #[instrument(skip(self))]
    pub async fn set_primary(
        &self,
        product_id: ProductId,
        id: ProductImageId,
    ) -> Result<ProductImage, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut gallery = lock_gallery(&mut tx, product_id).await?;
        if !gallery.set_primary(id) {
            return Err(RepositoryError::NotFound);
        }

        // Clear first: the one-primary index is checked per row
        sqlx::query(
            "UPDATE marketplace.product_images SET is_primary = FALSE \
             WHERE product_id = $1 AND is_primary AND id <> $2",
        )
        .bind(product_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        let row = sqlx::query_as::<_, ProductImageRow>(&format!(
            "UPDATE marketplace.product_images SET is_primary = TRUE \
             WHERE product_id = $1 AND id = $2 RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(product_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        ProductImage::try_from(row)
    }

    /// Remove an image, promoting the earliest remaining one if it was primary.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist or
    /// the image is not in its gallery.
    #[instrument(skip(self))]
    pub async fn remove(
        &self,
        product_id: ProductId,
        id: ProductImageId,
    ) -> Result<GalleryRemoval, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut gallery = lock_gallery(&mut tx, product_id).await?;
        let removal = gallery.remove(id).ok_or(RepositoryError::NotFound)?;

        sqlx::query("DELETE FROM marketplace.product_images WHERE product_id = $1 AND id = $2")
            .bind(product_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if let Some(promoted) = removal.promoted {
            sqlx::query("UPDATE marketplace.product_images SET is_primary = TRUE WHERE id = $1")
                .bind(promoted)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::info!(%product_id, image_id = %id, promoted = ?removal.promoted, "Product image removed");
        Ok(removal)
    }
}

/// Lock the product row and read its gallery.
async fn lock_gallery(
    conn: &mut PgConnection,
    product_id: ProductId,
) -> Result<Gallery, RepositoryError> {
    sqlx::query("SELECT 1 FROM marketplace.products WHERE id = $1 FOR UPDATE")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;

    let entries = sqlx::query_as::<_, GalleryEntryRow>(
        "SELECT id, is_primary FROM marketplace.product_images \
         WHERE product_id = $1 ORDER BY position",
    )
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|row| GalleryEntry {
        id: row.id,
        is_primary: row.is_primary,
    })
    .collect();
    Ok(Gallery::new(entries))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(url: Option<&str>, has_data: bool, position: i32) -> ProductImageRow {
        ProductImageRow {
            id: ProductImageId::new(3),
            product_id: ProductId::new(9),
            is_primary: true,
            position,
            created_at: Utc::now(),
            meta: ImageMetaRow {
                url: url.map(str::to_owned),
                content_type: has_data.then(|| "image/png".to_owned()),
                filename: None,
                size: has_data.then_some(4),
                uploaded_at: None,
                has_data,
            },
        }
    }

    #[test]
    fn test_row_becomes_gallery_image() {
        let image = ProductImage::try_from(row(None, true, 2)).unwrap();
        assert!(image.is_primary);
        assert_eq!(image.position, 2);
        assert_eq!(image.image.size, Some(4));

        let body = serde_json::to_value(&image).unwrap();
        assert_eq!(body["is_primary"], true);
        assert_eq!(body["has_data"], true);
    }

    #[test]
    fn test_sourceless_row_is_corrupt() {
        assert!(matches!(
            ProductImage::try_from(row(None, false, 1)),
            Err(RepositoryError::DataCorruption(_))
        ));
        assert!(matches!(
            ProductImage::try_from(row(Some("https://cdn.example.com/a.png"), false, -1)),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
