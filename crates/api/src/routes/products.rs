//! Product catalog route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use marketplace_core::aggregate::{RatingScore, RatingSummary};
use marketplace_core::model::{NewProduct, Product, ProductImage, ProductMetrics, ProductUpdate};
use marketplace_core::{Category, ProductId, ProductStatus, SellerStatus, UserId};

use crate::db::{
    CategoryCount, ProductFilter, ProductImageRepository, ProductRepository, ProductSort,
    UserRepository,
};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::{CurrentUser, Page, Pagination};
use crate::routes::{require_customer, require_owner_or_admin};
use crate::state::AppState;

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list).post(create))
        .route("/products/{id}", get(show).patch(update))
        .route("/products/{id}/view", post(record_view))
        .route("/products/{id}/rate", post(rate))
        .route("/categories", get(categories))
}

/// A product with its derived stock and discount figures.
#[derive(Debug, Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    #[serde(flatten)]
    pub metrics: ProductMetrics,
}

/// Product detail: the product plus its gallery, primary image flagged.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: ProductResponse,
    pub images: Vec<ProductImage>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        let metrics = ProductMetrics::from(&product);
        Self { product, metrics }
    }
}

/// Catalog query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<Category>,
    pub store: Option<UserId>,
    pub status: Option<ProductStatus>,
    pub q: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    #[serde(default)]
    pub sort: ProductSort,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductQuery {
    /// Build the repository filter. Inactive products are hidden unless the
    /// caller is an admin or asks for their own store.
    fn into_filter(self, viewer: Option<&CurrentUser>) -> (ProductFilter, Pagination) {
        let sees_inactive = viewer.is_some_and(|v| {
            v.is_admin() || self.store.is_some_and(|store| store == v.id)
        });
        let status = self
            .status
            .filter(|s| sees_inactive || *s != ProductStatus::Inactive);
        let filter = ProductFilter {
            category: self.category,
            store_owner_id: self.store,
            status,
            hide_inactive: !sees_inactive,
            search: self.q,
            min_price: self.min_price,
            max_price: self.max_price,
            in_stock: self.in_stock,
            sort: self.sort,
        };
        let pagination = Pagination {
            page: self.page,
            per_page: self.per_page,
        };
        (filter, pagination)
    }
}

/// Browse the catalog.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Page<ProductResponse>>> {
    let (filter, pagination) = query.into_filter(viewer.as_ref());
    let (products, total) = ProductRepository::new(state.pool())
        .list(&filter, pagination.limit(), pagination.offset())
        .await?;
    Ok(Json(
        Page::new(products, total, &pagination).map(ProductResponse::from),
    ))
}

pub(crate) fn visible_to(product: &Product, viewer: Option<&CurrentUser>) -> bool {
    product.status != ProductStatus::Inactive
        || viewer.is_some_and(|v| v.can_act_for(product.store_owner_id))
}

/// Product detail with its gallery. Inactive products are only shown to their
/// store and admins.
///
/// # Errors
///
/// Returns 404 if the product does not exist or is hidden.
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>> {
    let product = ProductRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|p| visible_to(p, viewer.as_ref()))
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    let images = ProductImageRepository::new(state.pool()).list(id).await?;
    Ok(Json(ProductDetail {
        product: product.into(),
        images,
    }))
}

/// List a new product. Only approved store owners may sell.
///
/// # Errors
///
/// Returns 403 for customers and unapproved sellers, 400 for invalid fields,
/// 409 if the store already uses the SKU.
#[tracing::instrument(skip(state, current, product))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(product): Json<NewProduct>,
) -> Result<impl IntoResponse> {
    if !current.is_store_owner() {
        return Err(AppError::Forbidden(
            "only store owners can list products".to_string(),
        ));
    }
    let owner = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;
    let approved = owner
        .store()
        .is_some_and(|s| s.seller_status == SellerStatus::Approved);
    if !approved {
        return Err(AppError::Forbidden(
            "seller account is not approved".to_string(),
        ));
    }

    let product = product.validated()?;
    let created = ProductRepository::new(state.pool())
        .create(current.id, &product)
        .await?;

    Ok((StatusCode::CREATED, Json(ProductResponse::from(created))))
}

/// Edit a product. Owning store owner or admin.
///
/// # Errors
///
/// Returns 403 for anyone else, 404 if missing, 400 for invalid fields.
#[tracing::instrument(skip(state, current, update))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<ProductId>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<ProductResponse>> {
    let products = ProductRepository::new(state.pool());
    let existing = products
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    require_owner_or_admin(&current, existing.store_owner_id)?;

    let updated = products.update(id, update).await?;
    tracing::info!(product_id = %id, updated_by = %current.id, "Product updated");
    Ok(Json(updated.into()))
}

/// Count a view and return the new total.
///
/// # Errors
///
/// Returns 404 if the product does not exist or is inactive.
pub async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<serde_json::Value>> {
    let views = ProductRepository::new(state.pool())
        .increment_views(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    Ok(Json(json!({ "views": views.value() })))
}

/// Every category with its count of listed products.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<CategoryCount>>> {
    Ok(Json(
        ProductRepository::new(state.pool()).category_counts().await?,
    ))
}

/// Rating request body, shared by product, seller and store ratings.
#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: Decimal,
}

impl RateRequest {
    pub(crate) fn score(&self) -> Result<RatingScore> {
        Ok(RatingScore::new(self.rating)?)
    }
}

/// Rate a product. Each customer rates a product once.
///
/// # Errors
///
/// Returns 403 for non-customers, 400 for a score outside 0..=5, 404 if the
/// product does not exist, 409 if already rated.
#[tracing::instrument(skip(state, current, body))]
pub async fn rate(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<ProductId>,
    Json(body): Json<RateRequest>,
) -> Result<Json<RatingSummary>> {
    require_customer(&current)?;
    let score = body.score()?;

    let summary = ProductRepository::new(state.pool())
        .rate(id, current.id, score)
        .await?;
    add_breadcrumb("rating", "Rated product", Some(&[("product_id", &id.to_string())]));
    Ok(Json(summary))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use marketplace_core::{Role, UserType};

    fn viewer(id: i64, role: Role) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            role,
            user_type: UserType::StoreOwner,
        }
    }

    #[test]
    fn test_anonymous_catalog_hides_inactive() {
        let query = ProductQuery {
            status: Some(ProductStatus::Inactive),
            ..Default::default()
        };
        let (filter, pagination) = query.into_filter(None);
        assert!(filter.hide_inactive);
        assert!(filter.status.is_none());
        assert_eq!(pagination.page(), 1);
    }

    #[test]
    fn test_own_store_shows_inactive() {
        let query = ProductQuery {
            store: Some(UserId::new(4)),
            status: Some(ProductStatus::Inactive),
            ..Default::default()
        };
        let (filter, _) = query.into_filter(Some(&viewer(4, Role::Customer)));
        assert!(!filter.hide_inactive);
        assert_eq!(filter.status, Some(ProductStatus::Inactive));
    }

    #[test]
    fn test_other_store_hides_inactive() {
        let query = ProductQuery {
            store: Some(UserId::new(4)),
            ..Default::default()
        };
        let (filter, _) = query.into_filter(Some(&viewer(5, Role::Customer)));
        assert!(filter.hide_inactive);

        let (filter, _) = ProductQuery::default().into_filter(Some(&viewer(5, Role::Admin)));
        assert!(!filter.hide_inactive);
    }

    #[test]
    fn test_query_parses_from_url() {
        let uri: axum::http::Uri = "/products?category=women&sort=price_asc&in_stock=true&page=2"
            .parse()
            .unwrap();
        let Query(query) = Query::<ProductQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(query.category, Some(Category::Women));
        assert_eq!(query.sort, ProductSort::PriceAsc);
        assert_eq!(query.in_stock, Some(true));
        assert_eq!(query.page, Some(2));
    }

    #[test]
    fn test_rate_request_bounds() {
        let body = RateRequest {
            rating: Decimal::new(6, 0),
        };
        assert!(matches!(body.score(), Err(AppError::Aggregate(_))));
        let body = RateRequest {
            rating: Decimal::new(-1, 0),
        };
        assert!(matches!(body.score(), Err(AppError::Aggregate(_))));
        for rating in [Decimal::ZERO, Decimal::new(45, 1), Decimal::new(5, 0)] {
            assert!(RateRequest { rating }.score().is_ok());
        }
    }
}
