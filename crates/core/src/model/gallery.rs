//! Product image galleries.
//!
//! A product carries up to [`MAX_GALLERY_IMAGES`] images in upload order.
//! Whenever the gallery is non-empty exactly one image is primary: the first
//! upload becomes primary, and removing the primary promotes the earliest
//! remaining image.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::{AggregateError, ImageInfo};
use crate::types::{ProductId, ProductImageId};

/// Most images one product may carry.
pub const MAX_GALLERY_IMAGES: usize = 10;

/// One gallery image as clients see it: position, primary flag and the
/// image metadata (never the payload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductImage {
    pub id: ProductImageId,
    pub product_id: ProductId,
    pub is_primary: bool,
    pub position: u32,
    #[serde(flatten)]
    pub image: ImageInfo,
    pub created_at: DateTime<Utc>,
}

/// The part of a gallery image the primary rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GalleryEntry {
    pub id: ProductImageId,
    pub is_primary: bool,
}

/// Result of removing an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GalleryRemoval {
    /// Image that became primary because the removed one was.
    pub promoted: Option<ProductImageId>,
}

/// The images of one product, in position order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    /// A gallery from stored entries, already in position order.
    #[must_use]
    pub const fn new(entries: Vec<GalleryEntry>) -> Self {
        Self { entries }
    }

    /// Entries in position order.
    #[must_use]
    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    /// The primary image, if any.
    #[must_use]
    pub fn primary(&self) -> Option<ProductImageId> {
        self.entries.iter().find(|e| e.is_primary).map(|e| e.id)
    }

    /// Check there is room for one more image.
    ///
    /// Returns whether that image becomes primary.
    ///
    /// # Errors
    ///
    /// Returns `AggregateError::InvalidValue` when the gallery is full.
    pub fn admit(&self) -> Result<bool, AggregateError> {
        if self.entries.len() >= MAX_GALLERY_IMAGES {
            return Err(AggregateError::invalid(
                "images",
                format!("a product has at most {MAX_GALLERY_IMAGES} images"),
            ));
        }
        Ok(self.primary().is_none())
    }

    /// Append an admitted image.
    pub fn push(&mut self, id: ProductImageId, is_primary: bool) {
        self.entries.push(GalleryEntry { id, is_primary });
    }

    /// Make `id` the only primary image.
    ///
    /// Returns `false` if `id` is not in this gallery; nothing changes then.
    pub fn set_primary(&mut self, id: ProductImageId) -> bool {
        if !self.entries.iter().any(|e| e.id == id) {
            return false;
        }
        for entry in &mut self.entries {
            entry.is_primary = entry.id == id;
        }
        true
    }

    /// Remove `id`, promoting the earliest remaining image if it was primary.
    ///
    /// Returns `None` if `id` is not in this gallery.
    pub fn remove(&mut self, id: ProductImageId) -> Option<GalleryRemoval> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        let removed = self.entries.remove(index);

        let promoted = if removed.is_primary {
            self.entries.first_mut().map(|first| {
                first.is_primary = true;
                first.id
            })
        } else {
            None
        };
        Some(GalleryRemoval { promoted })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(raw: i64) -> ProductImageId {
        ProductImageId::new(raw)
    }

    fn gallery_of(n: i64) -> Gallery {
        let mut gallery = Gallery::default();
        for raw in 1..=n {
            let primary = gallery.admit().unwrap();
            gallery.push(id(raw), primary);
        }
        gallery
    }

    #[test]
    fn test_first_image_becomes_primary() {
        let gallery = gallery_of(3);
        assert_eq!(gallery.primary(), Some(id(1)));
        assert_eq!(gallery.entries().iter().filter(|e| e.is_primary).count(), 1);
    }

    #[test]
    fn test_full_gallery_is_refused() {
        let gallery = gallery_of(i64::try_from(MAX_GALLERY_IMAGES).unwrap());
        assert!(gallery.admit().is_err());
    }

    #[test]
    fn test_set_primary_moves_flag() {
        let mut gallery = gallery_of(3);
        assert!(gallery.set_primary(id(3)));
        assert_eq!(gallery.primary(), Some(id(3)));
        assert_eq!(gallery.entries().iter().filter(|e| e.is_primary).count(), 1);

        assert!(!gallery.set_primary(id(99)));
        assert_eq!(gallery.primary(), Some(id(3)));
    }

    #[test]
    fn test_removing_primary_promotes_earliest() {
        let mut gallery = gallery_of(3);
        let removal = gallery.remove(id(1)).unwrap();
        assert_eq!(removal.promoted, Some(id(2)));
        assert_eq!(gallery.primary(), Some(id(2)));
    }

    #[test]
    fn test_removing_other_image_keeps_primary() {
        let mut gallery = gallery_of(3);
        let removal = gallery.remove(id(2)).unwrap();
        assert!(removal.promoted.is_none());
        assert_eq!(gallery.primary(), Some(id(1)));
        assert!(gallery.remove(id(2)).is_none());
    }

    #[test]
    fn test_removing_last_image_leaves_no_primary() {
        let mut gallery = gallery_of(1);
        assert_eq!(gallery.remove(id(1)), Some(GalleryRemoval { promoted: None }));
        assert!(gallery.primary().is_none());
        assert!(gallery.admit().unwrap());
    }
}
