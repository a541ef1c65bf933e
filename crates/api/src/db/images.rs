//! Image slot persistence for profile images and store logos.
//!
//! Both slots share one column layout (`<prefix>url`, `<prefix>data`,
//! `<prefix>content_type`, `<prefix>filename`, `<prefix>size`,
//! `<prefix>uploaded_at`) on their owner's row. Metadata reads never fetch the
//! payload.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use marketplace_core::{UserId, ValidationError};
use marketplace_core::aggregate::{AggregateError, ImageInfo, ImageSlot, StoredImage};

use super::{RepositoryError, non_negative_u32};

/// Which image slot an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTarget {
    /// `users.image_*`, keyed by user id.
    ProfileImage,
    /// `store_profiles.logo_*`, keyed by the store owner's user id.
    StoreLogo,
}

impl ImageTarget {
    const fn table(self) -> &'static str {
        match self {
            Self::ProfileImage => "marketplace.users",
            Self::StoreLogo => "marketplace.store_profiles",
        }
    }

    const fn key(self) -> &'static str {
        match self {
            Self::ProfileImage => "id",
            Self::StoreLogo => "user_id",
        }
    }

    const fn prefix(self) -> &'static str {
        match self {
            Self::ProfileImage => "image_",
            Self::StoreLogo => "logo_",
        }
    }

    fn metadata_columns(self) -> String {
        let p = self.prefix();
        format!(
            "{p}url AS url, {p}content_type AS content_type, {p}filename AS filename, \
             {p}size AS size, {p}uploaded_at AS uploaded_at, ({p}data IS NOT NULL) AS has_data"
        )
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct ImageMetaRow {
    pub(super) url: Option<String>,
    pub(super) content_type: Option<String>,
    pub(super) filename: Option<String>,
    pub(super) size: Option<i32>,
    pub(super) uploaded_at: Option<DateTime<Utc>>,
    pub(super) has_data: bool,
}

impl ImageMetaRow {
    pub(super) fn into_info(self) -> Result<Option<ImageInfo>, RepositoryError> {
        if self.url.is_none() && !self.has_data {
            return Ok(None);
        }
        let size = self
            .size
            .map(|s| non_negative_u32("image size", s).map(|s| s as usize))
            .transpose()?;
        Ok(Some(ImageInfo {
            url: self.url,
            filename: self.filename,
            content_type: self.content_type,
            size,
            uploaded_at: self.uploaded_at,
            has_data: self.has_data,
        }))
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct ImageRow {
    url: Option<String>,
    data: Option<Vec<u8>>,
    content_type: Option<String>,
    filename: Option<String>,
    uploaded_at: Option<DateTime<Utc>>,
}

impl ImageRow {
    pub(super) fn into_slot(self) -> ImageSlot {
        match (self.url, self.data) {
            (_, Some(data)) => {
                ImageSlot::restore_binary(data, self.content_type, self.filename, self.uploaded_at)
            }
            (Some(url), None) => ImageSlot::with(StoredImage::Reference { url }),
            (None, None) => ImageSlot::empty(),
        }
    }
}

/// Repository for image slot operations.
pub struct ImageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ImageRepository<'a> {
    /// Create a new image repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Metadata of the image in a slot, without the payload.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the owner row does not exist.
    #[instrument(skip(self))]
    pub async fn info(
        &self,
        target: ImageTarget,
        owner: UserId,
    ) -> Result<Option<ImageInfo>, RepositoryError> {
        let row = sqlx::query_as::<_, ImageMetaRow>(&format!(
            "SELECT {} FROM {} WHERE {} = $1",
            target.metadata_columns(),
            target.table(),
            target.key()
        ))
        .bind(owner)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        row.into_info()
    }

    /// Load a slot with its payload.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the owner row does not exist.
    #[instrument(skip(self))]
    pub async fn load(
        &self,
        target: ImageTarget,
        owner: UserId,
    ) -> Result<ImageSlot, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, target, owner, false).await
    }

    /// Change a slot under the owner's row lock and persist the result.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the owner row does not exist.
    /// Returns `RepositoryError::Aggregate` if the slot rejects the change;
    /// nothing is written then.
    #[instrument(skip(self, change))]
    pub async fn update_with<T, F>(
        &self,
        target: ImageTarget,
        owner: UserId,
        change: F,
    ) -> Result<(T, Option<ImageInfo>), RepositoryError>
    where
        F: FnOnce(&mut ImageSlot) -> Result<T, AggregateError> + Send,
        T: Send,
    {
        let mut tx = self.pool.begin().await?;
        let mut slot = fetch(&mut tx, target, owner, true).await?;

        let outcome = change(&mut slot)?;
        save(&mut tx, target, owner, &slot).await?;

        tx.commit().await?;
        Ok((outcome, slot.info()))
    }
}

async fn fetch(
    conn: &mut PgConnection,
    target: ImageTarget,
    owner: UserId,
    lock: bool,
) -> Result<ImageSlot, RepositoryError> {
    let p = target.prefix();
    let suffix = if lock { " FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, ImageRow>(&format!(
        "SELECT {p}url AS url, {p}data AS data, {p}content_type AS content_type, \
         {p}filename AS filename, {p}uploaded_at AS uploaded_at \
         FROM {} WHERE {} = $1{suffix}",
        target.table(),
        target.key()
    ))
    .bind(owner)
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;
    Ok(row.into_slot())
}

/// Column values for a stored image; all `None` for an empty slot.
pub(super) struct ImageColumns<'a> {
    pub url: Option<&'a str>,
    pub data: Option<&'a [u8]>,
    pub content_type: Option<&'a str>,
    pub filename: Option<&'a str>,
    pub size: Option<i32>,
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl<'a> ImageColumns<'a> {
    pub(super) fn of(image: Option<&'a StoredImage>) -> Result<Self, RepositoryError> {
        Ok(match image {
            None => Self {
                url: None,
                data: None,
                content_type: None,
                filename: None,
                size: None,
                uploaded_at: None,
            },
            Some(StoredImage::Reference { url }) => Self {
                url: Some(url.as_str()),
                data: None,
                content_type: None,
                filename: None,
                size: None,
                uploaded_at: None,
            },
            Some(StoredImage::Binary(blob)) => Self {
                url: None,
                data: Some(blob.data()),
                content_type: Some(blob.content_type()),
                filename: blob.filename(),
                size: Some(i32::try_from(blob.size()).map_err(|_| {
                    RepositoryError::Validation(ValidationError::field(
                        "image",
                        "payload too large",
                    ))
                })?),
                uploaded_at: Some(blob.uploaded_at()),
            },
        })
    }
}

async fn save(
    conn: &mut PgConnection,
    target: ImageTarget,
    owner: UserId,
    slot: &ImageSlot,
) -> Result<(), RepositoryError> {
    let columns = ImageColumns::of(slot.image())?;
    let p = target.prefix();
    sqlx::query(&format!(
        "UPDATE {} SET {p}url = $2, {p}data = $3, {p}content_type = $4, \
         {p}filename = $5, {p}size = $6, {p}uploaded_at = $7 WHERE {} = $1",
        target.table(),
        target.key()
    ))
    .bind(owner)
    .bind(columns.url)
    .bind(columns.data)
    .bind(columns.content_type)
    .bind(columns.filename)
    .bind(columns.size)
    .bind(columns.uploaded_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_columns_use_prefix() {
        let cols = ImageTarget::StoreLogo.metadata_columns();
        assert!(cols.starts_with("logo_url AS url"));
        assert!(cols.contains("(logo_data IS NOT NULL) AS has_data"));
        assert_eq!(ImageTarget::ProfileImage.key(), "id");
    }

    #[test]
    fn test_empty_meta_row_has_no_info() {
        let row = ImageMetaRow {
            url: None,
            content_type: None,
            filename: None,
            size: None,
            uploaded_at: None,
            has_data: false,
        };
        assert!(row.into_info().unwrap().is_none());
    }

    #[test]
    fn test_binary_row_restores_slot() {
        let row = ImageRow {
            url: None,
            data: Some(vec![1, 2, 3]),
            content_type: Some("image/png".into()),
            filename: Some("logo.png".into()),
            uploaded_at: None,
        };
        let info = row.into_slot().info().unwrap();
        assert!(info.has_data);
        assert_eq!(info.size, Some(3));
        assert_eq!(info.filename.as_deref(), Some("logo.png"));
    }

    #[test]
    fn test_url_row_restores_reference() {
        let row = ImageRow {
            url: Some("https://cdn.example.com/a.png".into()),
            data: None,
            content_type: None,
            filename: None,
            uploaded_at: None,
        };
        let slot = row.into_slot();
        assert_eq!(slot.src().as_deref(), Some("https://cdn.example.com/a.png"));

        let columns = ImageColumns::of(slot.image()).unwrap();
        assert_eq!(columns.url, Some("https://cdn.example.com/a.png"));
        assert!(columns.data.is_none() && columns.size.is_none());
    }

    #[test]
    fn test_binary_columns_carry_size() {
        let slot = ImageSlot::restore_binary(vec![7; 12], Some("image/webp".into()), None, None);
        let columns = ImageColumns::of(slot.image()).unwrap();
        assert_eq!(columns.size, Some(12));
        assert_eq!(columns.content_type, Some("image/webp"));
        assert!(columns.url.is_none());
    }
}
