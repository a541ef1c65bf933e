//! Request-scoped models for the API.

pub mod page;
pub mod session;

pub use page::{Page, Pagination};
pub use session::{CurrentUser, keys as session_keys};
