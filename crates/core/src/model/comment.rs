//! Product comments and one-level reply threads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ValidationError, bounded_text};
use crate::types::{CommentId, ProductId, UserId};

/// Comment body, 1 to 2000 characters after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommentContent(String);

impl CommentContent {
    /// Maximum length in characters.
    pub const MAX_LENGTH: usize = 2000;

    /// Validate a comment body.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Field` for an empty or overlong body.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        bounded_text("content", s, 1, Self::MAX_LENGTH).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CommentContent {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CommentContent> for String {
    fn from(content: CommentContent) -> Self {
        content.0
    }
}

/// A comment on a product, optionally replying to another comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub product_id: ProductId,
    pub author_id: UserId,
    /// Author's display name at read time.
    pub author_name: String,
    pub content: CommentContent,
    pub parent_id: Option<CommentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    #[must_use]
    pub const fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Check that a new comment on `product_id` may reply to `self`.
    ///
    /// Replies nest one level: the parent must be a top-level comment on the
    /// same product.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Field` naming `parent_id` otherwise.
    pub fn accepts_reply_on(&self, product_id: ProductId) -> Result<(), ValidationError> {
        if self.product_id != product_id {
            return Err(ValidationError::field(
                "parent_id",
                "parent comment belongs to another product",
            ));
        }
        if self.is_reply() {
            return Err(ValidationError::field(
                "parent_id",
                "cannot reply to a reply",
            ));
        }
        Ok(())
    }
}

/// A top-level comment with its replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

/// Group a flat list of comments into threads.
///
/// Threads keep the order of their top-level comments in `comments`; replies
/// keep their relative order. Replies whose parent is not a top-level comment
/// in the list are dropped.
#[must_use]
pub fn build_threads(comments: Vec<Comment>) -> Vec<CommentThread> {
    let (roots, replies): (Vec<_>, Vec<_>) = comments.into_iter().partition(|c| !c.is_reply());

    let mut threads: Vec<CommentThread> = roots
        .into_iter()
        .map(|comment| CommentThread {
            comment,
            replies: Vec::new(),
        })
        .collect();

    for reply in replies {
        if let Some(thread) = threads
            .iter_mut()
            .find(|t| Some(t.comment.id) == reply.parent_id)
        {
            thread.replies.push(reply);
        }
    }
    threads
}
