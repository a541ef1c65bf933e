//! User repository for database operations.
//!
//! A user is one `users` row plus, for store owners, one `store_profiles` row.
//! Image columns are never read here; see [`super::images`].

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use marketplace_core::aggregate::{Counter, RatingScore, RatingSummary, StoreCounters};
use marketplace_core::model::{
    CustomerProfile, SocialLinks, StoreProfile, User, UserKind, UserProfile, WorkingHours,
};
use marketplace_core::{
    AccountStatus, Email, PersonName, Phone, PostCode, Role, SellerStatus, UserId, UserType,
};

use super::{RepositoryError, non_negative_u32, non_negative_u64, to_i32};

const USER_COLUMNS: &str = "id, first_name, last_name, email, phone, post_code, birthday, city, \
     is_verified, role, status, user_type, created_at, updated_at";

const STORE_COLUMNS: &str = "user_id, store_name, store_description, seller_status, \
     seller_rating_total, seller_rating_count, store_rating_total, store_rating_count, \
     total_sales, total_revenue, working_hours, social_links";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    first_name: PersonName,
    last_name: PersonName,
    email: Option<Email>,
    phone: Phone,
    post_code: Option<PostCode>,
    birthday: Option<NaiveDate>,
    city: Option<String>,
    is_verified: bool,
    role: Role,
    status: AccountStatus,
    user_type: UserType,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct StoreRow {
    user_id: UserId,
    store_name: String,
    store_description: Option<String>,
    seller_status: SellerStatus,
    seller_rating_total: Decimal,
    seller_rating_count: i32,
    store_rating_total: Decimal,
    store_rating_count: i32,
    total_sales: i64,
    total_revenue: Decimal,
    working_hours: Json<WorkingHours>,
    social_links: Json<SocialLinks>,
}

impl TryFrom<StoreRow> for StoreProfile {
    type Error = RepositoryError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        Ok(Self {
            store_name: row.store_name,
            store_description: row.store_description,
            seller_status: row.seller_status,
            seller_rating: RatingSummary::from_parts(
                row.seller_rating_total,
                non_negative_u32("seller_rating_count", row.seller_rating_count)?,
            ),
            store_rating: RatingSummary::from_parts(
                row.store_rating_total,
                non_negative_u32("store_rating_count", row.store_rating_count)?,
            ),
            counters: StoreCounters {
                total_sales: Counter::from_raw(non_negative_u64("total_sales", row.total_sales)?),
                total_revenue: row.total_revenue,
            },
            working_hours: row.working_hours.0,
            social_links: row.social_links.0,
        })
    }
}

impl UserRow {
    fn into_user(self, store: Option<StoreRow>) -> Result<User, RepositoryError> {
        let kind = match (self.user_type, store) {
            (UserType::Customer, _) => UserKind::Customer(CustomerProfile::default()),
            (UserType::StoreOwner, Some(store)) => {
                UserKind::StoreOwner(Box::new(StoreProfile::try_from(store)?))
            }
            (UserType::StoreOwner, None) => {
                return Err(RepositoryError::DataCorruption(format!(
                    "store owner {} has no store profile",
                    self.id
                )));
            }
        };
        let profile = UserProfile {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            post_code: self.post_code,
            birthday: self.birthday,
            city: self.city,
            is_verified: self.is_verified,
            role: self.role,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        Ok(User::new(profile, kind))
    }
}

/// Validated fields for a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: PersonName,
    pub last_name: PersonName,
    pub email: Option<Email>,
    pub phone: Phone,
    pub post_code: Option<PostCode>,
    pub birthday: Option<NaiveDate>,
    pub city: Option<String>,
    pub role: Role,
}

/// Stored credentials for a phone number.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Credentials {
    pub id: UserId,
    pub password_hash: String,
    pub status: AccountStatus,
}

/// Which of a store owner's two ratings to update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatedAspect {
    Seller,
    Store,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a store owner has no store row.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id, false).await
    }

    /// Get the password hash and status for a phone number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_credentials(
        &self,
        phone: &Phone,
    ) -> Result<Option<Credentials>, RepositoryError> {
        let row = sqlx::query_as::<_, Credentials>(
            "SELECT id, password_hash, status FROM marketplace.users WHERE phone = $1",
        )
        .bind(phone)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// List users, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), RepositoryError> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM marketplace.users")
            .fetch_one(self.pool)
            .await?;

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM marketplace.users \
             ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id.as_i64()).collect();
        let stores = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM marketplace.store_profiles WHERE user_id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;
        let mut stores: HashMap<UserId, StoreRow> =
            stores.into_iter().map(|s| (s.user_id, s)).collect();

        let users = rows
            .into_iter()
            .map(|row| {
                let store = stores.remove(&row.id);
                row.into_user(store)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((users, total.0))
    }

    /// Create an account. Store owners get their store profile in the same
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the phone or email is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, user, store, password_hash), fields(phone = %user.phone))]
    pub async fn create(
        &self,
        user: &NewUser,
        store: Option<&StoreProfile>,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let user_type = if store.is_some() {
            UserType::StoreOwner
        } else {
            UserType::Customer
        };

        let mut tx = self.pool.begin().await?;

        let (id,): (UserId,) = sqlx::query_as(
            "INSERT INTO marketplace.users \
             (first_name, last_name, email, phone, post_code, birthday, city, password_hash, \
              role, user_type) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING id",
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.email.as_ref())
        .bind(&user.phone)
        .bind(user.post_code.as_ref())
        .bind(user.birthday)
        .bind(user.city.as_deref())
        .bind(password_hash)
        .bind(user.role)
        .bind(user_type)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique(e, "phone or email already registered"))?;

        if let Some(store) = store {
            sqlx::query(
                "INSERT INTO marketplace.store_profiles \
                 (user_id, store_name, store_description, seller_status, working_hours, social_links) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(id)
            .bind(&store.store_name)
            .bind(store.store_description.as_deref())
            .bind(store.seller_status)
            .bind(Json(&store.working_hours))
            .bind(Json(&store.social_links))
            .execute(&mut *tx)
            .await?;
        }

        let created = fetch(&mut tx, id, false)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;

        tracing::info!(user_id = %id, user_type = %user_type, "User created");
        Ok(created)
    }

    /// Lock a user, apply `change` to it and write the result back.
    ///
    /// The `users` row and, for store owners, the `store_profiles` row stay
    /// locked until commit. Sales counters are not written; they belong to
    /// checkout.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns whatever `change` returns; nothing is written in that case.
    pub async fn update_with<F>(&self, id: UserId, change: F) -> Result<User, RepositoryError>
    where
        F: FnOnce(&mut User) -> Result<(), RepositoryError> + Send,
    {
        let mut tx = self.pool.begin().await?;
        let mut user = fetch(&mut tx, id, true)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        change(&mut user)?;
        save(&mut tx, &user).await?;

        let updated = fetch(&mut tx, id, false)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Delete an account with its store, catalog, cart, wishlist and comments.
    ///
    /// Orders are kept, so an account that placed or received one stays.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Conflict` if orders reference the account.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM marketplace.users WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::referenced(e, "account has orders and cannot be deleted"))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Submit a rating for a store owner as seller or as store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist or is
    /// not a store owner.
    #[instrument(skip(self))]
    pub async fn rate(
        &self,
        id: UserId,
        aspect: RatedAspect,
        score: RatingScore,
    ) -> Result<RatingSummary, RepositoryError> {
        let user = self
            .update_with(id, |user| {
                let store = user.store_mut().ok_or(RepositoryError::NotFound)?;
                match aspect {
                    RatedAspect::Seller => store.rate_seller(score),
                    RatedAspect::Store => store.rate_store(score),
                };
                Ok(())
            })
            .await?;

        let store = user.store().ok_or(RepositoryError::NotFound)?;
        let summary = match aspect {
            RatedAspect::Seller => store.seller_rating,
            RatedAspect::Store => store.store_rating,
        };
        tracing::info!(
            store_owner_id = %id,
            ?aspect,
            average = %summary.average(),
            count = summary.count(),
            "Rating submitted"
        );
        Ok(summary)
    }
}

/// Load a user and, for store owners, their store profile.
///
/// With `lock`, both rows are selected `FOR UPDATE`.
async fn fetch(
    conn: &mut PgConnection,
    id: UserId,
    lock: bool,
) -> Result<Option<User>, RepositoryError> {
    let suffix = if lock { " FOR UPDATE" } else { "" };

    let Some(row) = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM marketplace.users WHERE id = $1{suffix}"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    else {
        return Ok(None);
    };

    let store = if row.user_type == UserType::StoreOwner {
        sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM marketplace.store_profiles WHERE user_id = $1{suffix}"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    } else {
        None
    };

    row.into_user(store).map(Some)
}

/// Write the mutable profile and store columns of `user`.
async fn save(conn: &mut PgConnection, user: &User) -> Result<(), RepositoryError> {
    let p = &user.profile;
    sqlx::query(
        "UPDATE marketplace.users SET \
         first_name = $2, last_name = $3, email = $4, post_code = $5, birthday = $6, \
         city = $7, is_verified = $8, role = $9, status = $10 \
         WHERE id = $1",
    )
    .bind(p.id)
    .bind(&p.first_name)
    .bind(&p.last_name)
    .bind(p.email.as_ref())
    .bind(p.post_code.as_ref())
    .bind(p.birthday)
    .bind(p.city.as_deref())
    .bind(p.is_verified)
    .bind(p.role)
    .bind(p.status)
    .execute(&mut *conn)
    .await
    .map_err(|e| RepositoryError::unique(e, "email already registered"))?;

    if let Some(store) = user.store() {
        sqlx::query(
            "UPDATE marketplace.store_profiles SET \
             store_name = $2, store_description = $3, seller_status = $4, \
             seller_rating_total = $5, seller_rating_count = $6, seller_rating_average = $7, \
             store_rating_total = $8, store_rating_count = $9, store_rating_average = $10, \
             working_hours = $11, social_links = $12 \
             WHERE user_id = $1",
        )
        .bind(p.id)
        .bind(&store.store_name)
        .bind(store.store_description.as_deref())
        .bind(store.seller_status)
        .bind(store.seller_rating.total())
        .bind(to_i32("seller_rating_count", store.seller_rating.count())?)
        .bind(store.seller_rating.average())
        .bind(store.store_rating.total())
        .bind(to_i32("store_rating_count", store.store_rating.count())?)
        .bind(store.store_rating.average())
        .bind(Json(&store.working_hours))
        .bind(Json(&store.social_links))
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
