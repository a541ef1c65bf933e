//! HTTP route handlers for the marketplace API.
//!
//! Every route below is nested under `/api`.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST   /auth/register                 - Register a customer
//! POST   /auth/register/store-owner     - Register a store owner and store
//! POST   /auth/login                    - Phone + password login
//! POST   /auth/logout                   - Logout
//!
//! # Users
//! GET    /users                         - List users (admin)
//! GET    /users/me                      - Current user
//! GET    /users/{id}                    - User detail (self or admin)
//! PATCH  /users/{id}                    - Edit profile (self or admin)
//! DELETE /users/{id}                    - Delete account (self or admin)
//! POST   /users/{id}/image              - Upload or link profile image
//! DELETE /users/{id}/image              - Remove profile image
//! GET    /users/{id}/image              - Profile image bytes (or redirect)
//! GET    /users/{id}/image-info         - Profile image metadata
//!
//! # Store owners
//! GET    /store-owners/{id}             - Public store page
//! GET    /store-owners/{id}/statistics  - Sales figures (owner or admin)
//! POST   /store-owners/{id}/rate-seller - Rate the seller
//! POST   /store-owners/{id}/rate-store  - Rate the store
//! POST   /store-owners/{id}/logo        - Upload or link store logo
//! DELETE /store-owners/{id}/logo        - Remove store logo
//! GET    /store-owners/{id}/logo        - Logo bytes (or redirect)
//! GET    /store-owners/{id}/logo-info   - Logo metadata
//!
//! # Products
//! GET    /products                      - Catalog with filters
//! POST   /products                      - Create (approved store owner)
//! GET    /products/{id}                 - Product detail
//! PATCH  /products/{id}                 - Edit (owning store owner or admin)
//! POST   /products/{id}/view            - Count a view
//! POST   /products/{id}/rate            - Rate (customer, once)
//! GET    /products/{id}/images          - Gallery in position order
//! POST   /products/{id}/images          - Add a gallery image (owner or admin)
//! GET    /products/{id}/images/{iid}    - Gallery image bytes (or redirect)
//! GET    /products/{id}/images/{iid}/info    - Gallery image metadata
//! PUT    /products/{id}/images/{iid}/primary - Make primary (owner or admin)
//! DELETE /products/{id}/images/{iid}    - Remove; earliest left becomes primary
//! GET    /products/{id}/comments        - Comment threads
//! POST   /products/{id}/comments        - Comment or reply
//! GET    /comments/{id}                 - One comment
//! PATCH  /comments/{id}                 - Edit content (author or admin)
//! DELETE /comments/{id}                 - Delete (author or admin)
//! GET    /categories                    - Categories with listed product counts
//!
//! # Cart (customers)
//! GET    /cart                          - Cart with totals
//! POST   /cart/items                    - Add a line
//! PATCH  /cart/items/{product_id}       - Set quantity (0 removes)
//! DELETE /cart/items/{product_id}       - Remove a line
//! DELETE /cart                          - Empty the cart
//! POST   /cart/checkout                 - Place orders
//!
//! # Wishlist (customers)
//! GET    /wishlist                      - Saved products
//! POST   /wishlist/items                - Save a product
//! GET    /wishlist/items/{product_id}   - Whether a product is saved
//! DELETE /wishlist/items/{product_id}   - Unsave a product
//! DELETE /wishlist                      - Empty the wishlist
//!
//! # Orders
//! GET    /orders                        - Orders visible to the caller
//! GET    /orders/{id}                   - Order detail
//! PATCH  /orders/{id}/status            - Move an order along its lifecycle
//! ```

pub mod auth;
pub mod cart;
pub mod comments;
pub mod images;
pub mod orders;
pub mod product_images;
pub mod products;
pub mod store_owners;
pub mod users;
pub mod wishlist;

use axum::Router;

use crate::error::AppError;
use crate::middleware::auth_rate_limiter;
use crate::models::CurrentUser;
use crate::state::AppState;

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router().layer(auth_rate_limiter()))
        .merge(users::router())
        .merge(store_owners::router())
        .merge(images::router())
        .merge(products::router())
        .merge(product_images::router())
        .merge(comments::router())
        .merge(cart::router())
        .merge(wishlist::router())
        .merge(orders::router())
}

/// Reject anyone who is not a customer.
pub(crate) fn require_customer(user: &CurrentUser) -> Result<(), AppError> {
    if user.is_customer() {
        Ok(())
    } else {
        Err(AppError::Forbidden("only customers can do this".to_string()))
    }
}

/// Reject anyone who is neither `owner` nor an admin.
pub(crate) fn require_owner_or_admin(
    user: &CurrentUser,
    owner: marketplace_core::UserId,
) -> Result<(), AppError> {
    if user.can_act_for(owner) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "you are not allowed to access this resource".to_string(),
        ))
    }
}
