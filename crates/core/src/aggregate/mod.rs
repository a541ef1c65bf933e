//! Aggregation and collection logic shared by every entity.
//!
//! Everything here is pure: operations take the current state and return the
//! next one (or mutate a value the caller owns), and never touch storage. The
//! API layer loads state inside a transaction, applies one of these operations
//! and writes the result back.

mod error;

pub mod collection;
pub mod counters;
pub mod image;
pub mod rating;

pub use collection::{
    AddOutcome, CartItem, CartItems, ClearOutcome, CollectionEntry, ItemCollection, Quantity,
    RemoveOutcome, WishlistItem, WishlistItems,
};
pub use counters::{Counter, ProductCounters, StoreCounters};
pub use error::AggregateError;
pub use image::{
    ACCEPTED_CONTENT_TYPES, ImageBlob, ImageInfo, ImageSlot, ImageStorage, StoredImage,
};
pub use rating::{AVERAGE_SCALE, RatingScore, RatingSummary};
