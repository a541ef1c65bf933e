//! Single-image slots such as a profile picture or a store logo.
//!
//! A slot is either empty or holds exactly one image. The image is stored one
//! of two ways, chosen per deployment through [`ImageStorage`]:
//!
//! - as an external URL reference, or
//! - as owned bytes plus content type, filename, size and upload time.
//!
//! Replacing an image overwrites whatever was there. Clearing unsets every
//! field at once.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AggregateError;

/// Content types accepted for uploaded bytes.
///
/// Raster formats only. SVG can carry script and is served from the API's
/// own origin, so it is refused.
pub const ACCEPTED_CONTENT_TYPES: [&str; 5] = [
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "image/avif",
];

/// Deployment-wide choice of how images are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStorage {
    /// Store the uploaded bytes in the database.
    #[default]
    Binary,
    /// Store only a URL pointing elsewhere.
    Url,
}

impl std::str::FromStr for ImageStorage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" => Ok(Self::Binary),
            "url" => Ok(Self::Url),
            other => Err(format!("invalid image storage: {other} (expected binary or url)")),
        }
    }
}

/// Owned image bytes and their metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    data: Vec<u8>,
    content_type: String,
    filename: Option<String>,
    uploaded_at: DateTime<Utc>,
}

impl ImageBlob {
    /// Raw image bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// MIME type, e.g. `image/png`.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Original filename, if the client sent one.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// When the image was stored.
    #[must_use]
    pub const fn uploaded_at(&self) -> DateTime<Utc> {
        self.uploaded_at
    }
}

/// The image held by a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredImage {
    /// External reference.
    Reference {
        /// Absolute `http(s)` URL.
        url: String,
    },
    /// Owned payload.
    Binary(ImageBlob),
}

/// Metadata about a slot's image, without the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    /// URL for reference images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Original filename.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// MIME type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Payload size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    /// Upload time for binary images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    /// Whether bytes are stored locally.
    pub has_data: bool,
}

/// A slot holding at most one image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageSlot(Option<StoredImage>);

impl ImageSlot {
    /// An empty slot.
    #[must_use]
    pub const fn empty() -> Self {
        Self(None)
    }

    /// A slot holding a previously stored image.
    #[must_use]
    pub const fn with(image: StoredImage) -> Self {
        Self(Some(image))
    }

    /// Point the slot at an external URL, replacing any existing image.
    ///
    /// # Errors
    ///
    /// Returns `AggregateError::InvalidValue` unless `url` is an absolute
    /// `http` or `https` URL. The slot is untouched on error.
    pub fn set_reference(&mut self, url: &str) -> Result<(), AggregateError> {
        let url = url.trim();
        let has_scheme = url.starts_with("https://") || url.starts_with("http://");
        let has_host = url
            .split_once("://")
            .is_some_and(|(_, rest)| !rest.is_empty() && !rest.starts_with('/'));
        if !has_scheme || !has_host {
            return Err(AggregateError::invalid(
                "url",
                "must be an absolute http(s) URL",
            ));
        }
        self.0 = Some(StoredImage::Reference {
            url: url.to_owned(),
        });
        Ok(())
    }

    /// Store owned bytes, replacing any existing image.
    ///
    /// The recorded size is always the payload length.
    ///
    /// # Errors
    ///
    /// Returns `AggregateError::InvalidValue` if the payload is empty or the
    /// content type is not one of [`ACCEPTED_CONTENT_TYPES`]. The slot is
    /// untouched on error.
    pub fn set_binary(
        &mut self,
        data: Vec<u8>,
        content_type: &str,
        filename: Option<String>,
    ) -> Result<(), AggregateError> {
        if data.is_empty() {
            return Err(AggregateError::invalid("image", "payload is empty"));
        }
        let content_type = content_type.trim().to_ascii_lowercase();
        if !ACCEPTED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(AggregateError::invalid(
                "content_type",
                format!(
                    "{content_type} is not accepted (use one of {})",
                    ACCEPTED_CONTENT_TYPES.join(", ")
                ),
            ));
        }
        self.0 = Some(StoredImage::Binary(ImageBlob {
            data,
            content_type,
            filename: filename.filter(|f| !f.trim().is_empty()),
            uploaded_at: Utc::now(),
        }));
        Ok(())
    }

    /// Empty the slot. Returns whether an image was present.
    ///
    /// Clearing an already-empty slot is a successful no-op.
    pub fn clear(&mut self) -> bool {
        self.0.take().is_some()
    }

    /// Whether the slot holds an image.
    #[must_use]
    pub const fn has_image(&self) -> bool {
        self.0.is_some()
    }

    /// The stored image.
    #[must_use]
    pub const fn image(&self) -> Option<&StoredImage> {
        self.0.as_ref()
    }

    /// Metadata for the stored image.
    #[must_use]
    pub fn info(&self) -> Option<ImageInfo> {
        self.0.as_ref().map(|image| match image {
            StoredImage::Reference { url } => ImageInfo {
                url: Some(url.clone()),
                filename: None,
                content_type: None,
                size: None,
                uploaded_at: None,
                has_data: false,
            },
            StoredImage::Binary(blob) => ImageInfo {
                url: None,
                filename: blob.filename.clone(),
                content_type: Some(blob.content_type.clone()),
                size: Some(blob.size()),
                uploaded_at: Some(blob.uploaded_at),
                has_data: true,
            },
        })
    }

    /// The image as something an `<img src>` can use: the URL itself, or a
    /// base64 `data:` URI for owned bytes.
    #[must_use]
    pub fn src(&self) -> Option<String> {
        self.0.as_ref().map(|image| match image {
            StoredImage::Reference { url } => url.clone(),
            StoredImage::Binary(blob) => format!(
                "data:{};base64,{}",
                blob.content_type,
                STANDARD.encode(&blob.data)
            ),
        })
    }

    /// Restore a binary image read back from storage.
    #[must_use]
    pub fn restore_binary(
        data: Vec<u8>,
        content_type: Option<String>,
        filename: Option<String>,
        uploaded_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self(Some(StoredImage::Binary(ImageBlob {
            data,
            content_type: content_type.unwrap_or_else(|| "application/octet-stream".to_owned()),
            filename,
            uploaded_at: uploaded_at.unwrap_or_else(Utc::now),
        })))
    }
}
