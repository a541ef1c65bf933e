//! Store page, statistics and seller/store rating handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::Serialize;

use marketplace_core::aggregate::{ImageInfo, RatingSummary, StoreCounters};
use marketplace_core::model::{SocialLinks, StoreProfile, User, WorkingHours};
use marketplace_core::{SellerStatus, UserId};

use crate::db::{
    ImageRepository, ImageTarget, ProductRepository, RatedAspect, StoreCatalogStats,
    UserRepository,
};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::routes::products::RateRequest;
use crate::routes::{require_customer, require_owner_or_admin};
use crate::state::AppState;

/// Build the store owners router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/store-owners/{id}", get(show))
        .route("/store-owners/{id}/statistics", get(statistics))
        .route("/store-owners/{id}/rate-seller", post(rate_seller))
        .route("/store-owners/{id}/rate-store", post(rate_store))
}

/// Public view of a store. Contact details stay private.
#[derive(Debug, Serialize)]
pub struct StoreView {
    pub id: UserId,
    pub owner_name: String,
    pub city: Option<String>,
    pub is_verified: bool,
    pub store_name: String,
    pub store_description: Option<String>,
    pub seller_status: SellerStatus,
    pub seller_rating: RatingSummary,
    pub store_rating: RatingSummary,
    pub working_hours: WorkingHours,
    pub social_links: SocialLinks,
    pub logo: Option<ImageInfo>,
}

impl StoreView {
    fn new(user: &User, store: &StoreProfile, logo: Option<ImageInfo>) -> Self {
        Self {
            id: user.profile.id,
            owner_name: user.profile.full_name(),
            city: user.profile.city.clone(),
            is_verified: user.profile.is_verified,
            store_name: store.store_name.clone(),
            store_description: store.store_description.clone(),
            seller_status: store.seller_status,
            seller_rating: store.seller_rating,
            store_rating: store.store_rating,
            working_hours: store.working_hours,
            social_links: store.social_links.clone(),
            logo,
        }
    }
}

/// Sales and catalog figures for a store.
#[derive(Debug, Serialize)]
pub struct StoreStatistics {
    pub store_owner_id: UserId,
    #[serde(flatten)]
    pub counters: StoreCounters,
    pub average_order_value: Decimal,
    pub seller_rating: RatingSummary,
    pub store_rating: RatingSummary,
    #[serde(flatten)]
    pub catalog: StoreCatalogStats,
}

impl StoreStatistics {
    fn new(id: UserId, store: &StoreProfile, catalog: StoreCatalogStats) -> Self {
        let orders = store.counters.total_sales.value();
        let average_order_value = if orders == 0 {
            Decimal::ZERO
        } else {
            (store.counters.total_revenue / Decimal::from(orders)).round_dp(2)
        };
        Self {
            store_owner_id: id,
            counters: store.counters,
            average_order_value,
            seller_rating: store.seller_rating,
            store_rating: store.store_rating,
            catalog,
        }
    }
}

async fn load_store_owner(state: &AppState, id: UserId) -> Result<User> {
    UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .filter(|u| u.store().is_some())
        .ok_or_else(|| AppError::NotFound("Store".to_string()))
}

/// Public store page.
///
/// # Errors
///
/// Returns 404 unless `id` is a store owner.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<StoreView>> {
    let user = load_store_owner(&state, id).await?;
    let logo = ImageRepository::new(state.pool())
        .info(ImageTarget::StoreLogo, id)
        .await?;
    let store = user
        .store()
        .ok_or_else(|| AppError::NotFound("Store".to_string()))?;
    Ok(Json(StoreView::new(&user, store, logo)))
}

/// Store statistics. Store owner or admin.
///
/// # Errors
///
/// Returns 403 for anyone else, 404 unless `id` is a store owner.
pub async fn statistics(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<UserId>,
) -> Result<Json<StoreStatistics>> {
    require_owner_or_admin(&current, id)?;
    let user = load_store_owner(&state, id).await?;
    let store = user
        .store()
        .ok_or_else(|| AppError::NotFound("Store".to_string()))?;
    let catalog = ProductRepository::new(state.pool()).store_stats(id).await?;
    Ok(Json(StoreStatistics::new(id, store, catalog)))
}

async fn submit_rating(
    state: &AppState,
    current: &CurrentUser,
    id: UserId,
    aspect: RatedAspect,
    body: &RateRequest,
) -> Result<Json<RatingSummary>> {
    require_customer(current)?;
    let score = body.score()?;
    let summary = UserRepository::new(state.pool())
        .rate(id, aspect, score)
        .await?;
    add_breadcrumb(
        "rating",
        "Rated store owner",
        Some(&[("store_owner_id", &id.to_string())]),
    );
    Ok(Json(summary))
}

/// Rate a store owner as a seller.
///
/// # Errors
///
/// Returns 403 for non-customers, 400 for a score outside 0..=5, 404 unless
/// `id` is a store owner.
pub async fn rate_seller(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<UserId>,
    Json(body): Json<RateRequest>,
) -> Result<Json<RatingSummary>> {
    submit_rating(&state, &current, id, RatedAspect::Seller, &body).await
}

/// Rate a store.
///
/// # Errors
///
/// Same as [`rate_seller`].
pub async fn rate_store(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<UserId>,
    Json(body): Json<RateRequest>,
) -> Result<Json<RatingSummary>> {
    submit_rating(&state, &current, id, RatedAspect::Store, &body).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use marketplace_core::aggregate::Counter;

    fn store(orders: u64, revenue: Decimal) -> StoreProfile {
        let mut store = StoreProfile::new("Bag House", None).unwrap();
        store.counters = StoreCounters {
            total_sales: Counter::from_raw(orders),
            total_revenue: revenue,
        };
        store
    }

    fn catalog() -> StoreCatalogStats {
        StoreCatalogStats {
            product_count: 3,
            active_product_count: 2,
            out_of_stock_count: 1,
            total_views: 40,
        }
    }

    #[test]
    fn test_average_order_value() {
        let stats = StoreStatistics::new(UserId::new(1), &store(3, Decimal::new(10000, 2)), catalog());
        assert_eq!(stats.average_order_value, Decimal::new(3333, 2));
    }

    #[test]
    fn test_average_order_value_without_orders() {
        let stats = StoreStatistics::new(UserId::new(1), &store(0, Decimal::ZERO), catalog());
        assert_eq!(stats.average_order_value, Decimal::ZERO);
    }

    #[test]
    fn test_statistics_serialize_flat() {
        let stats = StoreStatistics::new(UserId::new(7), &store(1, Decimal::new(500, 2)), catalog());
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["store_owner_id"], 7);
        assert_eq!(json["product_count"], 3);
        assert!(json.get("total_sales").is_some());
    }
}
