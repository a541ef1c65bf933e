//! User profile route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use tower_sessions::Session;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use marketplace_core::aggregate::ImageInfo;
use marketplace_core::model::{SocialLinks, StoreProfile, User, WorkingHours, validate_birthday};
use marketplace_core::{
    AccountStatus, Email, PersonName, PostCode, Role, SellerStatus, UserId, ValidationError,
};

use crate::db::{ImageRepository, ImageTarget, RepositoryError, UserRepository};
use crate::error::{AppError, Result, clear_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user};
use crate::models::{CurrentUser, Page, Pagination};
use crate::routes::require_owner_or_admin;
use crate::state::AppState;

/// Build the users router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(me))
        .route("/users/{id}", get(show).patch(update).delete(remove))
}

/// A user with the metadata of their images.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    #[serde(flatten)]
    pub user: User,
    pub image: Option<ImageInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_logo: Option<ImageInfo>,
}

/// Attach image metadata to a user.
pub(crate) async fn user_response(state: &AppState, user: User) -> Result<UserResponse> {
    let images = ImageRepository::new(state.pool());
    let id = user.profile.id;
    let image = images.info(ImageTarget::ProfileImage, id).await?;
    let store_logo = if user.store().is_some() {
        images.info(ImageTarget::StoreLogo, id).await?
    } else {
        None
    };
    Ok(UserResponse {
        user,
        image,
        store_logo,
    })
}

async fn load_user(state: &AppState, id: UserId) -> Result<User> {
    UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))
}

/// Current user's profile.
///
/// # Errors
///
/// Returns 401 without a session, 404 if the account was deleted.
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<UserResponse>> {
    let user = load_user(&state, current.id).await?;
    Ok(Json(user_response(&state, user).await?))
}

/// A user's profile. Visible to the user and to admins.
///
/// # Errors
///
/// Returns 403 for anyone else, 404 if the user does not exist.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<UserId>,
) -> Result<Json<UserResponse>> {
    require_owner_or_admin(&current, id)?;
    let user = load_user(&state, id).await?;
    Ok(Json(user_response(&state, user).await?))
}

/// All users, newest first. Admin only.
///
/// # Errors
///
/// Returns 403 for non-admins.
pub async fn list_users(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<User>>> {
    if !current.is_admin() {
        return Err(AppError::Forbidden("admin access required".to_string()));
    }
    let (users, total) = UserRepository::new(state.pool())
        .list(pagination.limit(), pagination.offset())
        .await?;
    Ok(Json(Page::new(users, total, &pagination)))
}

/// Profile edit request. Absent fields are left alone; an empty string clears
/// `email`, `post_code` and `city`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub post_code: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub city: Option<String>,
    // Admin only
    pub role: Option<Role>,
    pub status: Option<AccountStatus>,
    pub is_verified: Option<bool>,
    pub seller_status: Option<SellerStatus>,
    // Store owners only
    pub store_name: Option<String>,
    pub store_description: Option<String>,
    pub working_hours: Option<WorkingHours>,
    pub social_links: Option<SocialLinks>,
}

/// A parsed [`UpdateUserRequest`]. `Some(None)` clears an optional field.
#[derive(Debug, Default)]
struct UserChanges {
    first_name: Option<PersonName>,
    last_name: Option<PersonName>,
    email: Option<Option<Email>>,
    post_code: Option<Option<PostCode>>,
    birthday: Option<NaiveDate>,
    city: Option<Option<String>>,
    role: Option<Role>,
    status: Option<AccountStatus>,
    is_verified: Option<bool>,
    seller_status: Option<SellerStatus>,
    store: Option<StoreChanges>,
}

#[derive(Debug, Default)]
struct StoreChanges {
    store_name: Option<String>,
    store_description: Option<Option<String>>,
    working_hours: Option<WorkingHours>,
    social_links: Option<SocialLinks>,
}

fn clearable<T, E>(
    value: Option<&str>,
    parse: impl FnOnce(&str) -> std::result::Result<T, E>,
) -> std::result::Result<Option<Option<T>>, E> {
    match value.map(str::trim) {
        None => Ok(None),
        Some("") => Ok(Some(None)),
        Some(v) => parse(v).map(|v| Some(Some(v))),
    }
}

impl UpdateUserRequest {
    fn touches_admin_fields(&self) -> bool {
        self.role.is_some()
            || self.status.is_some()
            || self.is_verified.is_some()
            || self.seller_status.is_some()
    }

    fn touches_store_fields(&self) -> bool {
        self.store_name.is_some()
            || self.store_description.is_some()
            || self.working_hours.is_some()
            || self.social_links.is_some()
            || self.seller_status.is_some()
    }

    fn parse(self, today: NaiveDate) -> std::result::Result<UserChanges, ValidationError> {
        let store = if self.touches_store_fields() {
            // Run the name and description through the registration rules.
            let checked = StoreProfile::new(
                self.store_name.as_deref().unwrap_or("unchanged"),
                self.store_description.as_deref(),
            )?;
            Some(StoreChanges {
                store_name: self.store_name.map(|_| checked.store_name),
                store_description: self.store_description.map(|_| checked.store_description),
                working_hours: self.working_hours,
                social_links: self.social_links,
            })
        } else {
            None
        };

        Ok(UserChanges {
            first_name: self.first_name.as_deref().map(PersonName::parse).transpose()?,
            last_name: self.last_name.as_deref().map(PersonName::parse).transpose()?,
            email: clearable(self.email.as_deref(), Email::parse)?,
            post_code: clearable(self.post_code.as_deref(), PostCode::parse)?,
            birthday: self
                .birthday
                .map(|b| validate_birthday(b, today))
                .transpose()?,
            city: clearable(self.city.as_deref(), |c| {
                Ok::<_, ValidationError>(c.to_owned())
            })?,
            role: self.role,
            status: self.status,
            is_verified: self.is_verified,
            seller_status: self.seller_status,
            store,
        })
    }
}

impl UserChanges {
    fn apply(self, user: &mut User) -> std::result::Result<(), RepositoryError> {
        let needs_store = self.store.is_some() || self.seller_status.is_some();
        if needs_store && user.store().is_none() {
            return Err(ValidationError::field("store", "user is not a store owner").into());
        }

        let p = &mut user.profile;
        if let Some(v) = self.first_name {
            p.first_name = v;
        }
        if let Some(v) = self.last_name {
            p.last_name = v;
        }
        if let Some(v) = self.email {
            p.email = v;
        }
        if let Some(v) = self.post_code {
            p.post_code = v;
        }
        if let Some(v) = self.birthday {
            p.birthday = Some(v);
        }
        if let Some(v) = self.city {
            p.city = v;
        }
        if let Some(v) = self.role {
            p.role = v;
        }
        if let Some(v) = self.status {
            p.status = v;
        }
        if let Some(v) = self.is_verified {
            p.is_verified = v;
        }

        if let Some(store) = user.store_mut() {
            if let Some(v) = self.seller_status {
                store.seller_status = v;
            }
            if let Some(changes) = self.store {
                if let Some(v) = changes.store_name {
                    store.store_name = v;
                }
                if let Some(v) = changes.store_description {
                    store.store_description = v;
                }
                if let Some(v) = changes.working_hours {
                    store.working_hours = v;
                }
                if let Some(v) = changes.social_links {
                    store.social_links = v;
                }
            }
        }
        Ok(())
    }
}

fn check_update_permissions(current: &CurrentUser, request: &UpdateUserRequest) -> Result<()> {
    if request.touches_admin_fields() && !current.is_admin() {
        return Err(AppError::Forbidden(
            "only admins can change role, status, verification or seller status".to_string(),
        ));
    }
    Ok(())
}

/// Edit a profile. Users edit themselves; admins edit anyone and may also set
/// role, status, verification and seller status.
///
/// # Errors
///
/// Returns 400 for invalid fields or store fields on a customer, 403 when not
/// permitted, 404 if the user does not exist.
#[tracing::instrument(skip(state, current, request))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<UserId>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    require_owner_or_admin(&current, id)?;
    check_update_permissions(&current, &request)?;
    let changes = request.parse(Utc::now().date_naive())?;

    let user = UserRepository::new(state.pool())
        .update_with(id, move |user| changes.apply(user))
        .await?;
    tracing::info!(updated_by = %current.id, "User updated");

    Ok(Json(user_response(&state, user).await?))
}

/// Delete an account. Self or admin. Deleting yourself ends the session.
///
/// # Errors
///
/// Returns 403 when not permitted, 404 if the user does not exist, 409 if
/// orders reference the account.
#[tracing::instrument(skip(state, current, session))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    session: Session,
    Path(id): Path<UserId>,
) -> Result<StatusCode> {
    require_owner_or_admin(&current, id)?;
    UserRepository::new(state.pool()).delete(id).await?;
    tracing::info!(deleted_by = %current.id, "Account deleted");

    if current.id == id {
        clear_current_user(&session)
            .await
            .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
        clear_sentry_user();
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use marketplace_core::UserType;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    fn customer() -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            role: Role::Customer,
            user_type: UserType::Customer,
        }
    }

    #[test]
    fn test_empty_string_clears() {
        let request = UpdateUserRequest {
            email: Some(String::new()),
            city: Some("  ".into()),
            ..Default::default()
        };
        let changes = request.parse(today()).unwrap();
        assert_eq!(changes.email, Some(None));
        assert_eq!(changes.city, Some(None));
        assert!(changes.post_code.is_none());
    }

    #[test]
    fn test_invalid_email_rejected() {
        let request = UpdateUserRequest {
            email: Some("not-an-email".into()),
            ..Default::default()
        };
        assert!(request.parse(today()).is_err());
    }

    #[test]
    fn test_admin_fields_need_admin() {
        let request = UpdateUserRequest {
            role: Some(Role::Admin),
            ..Default::default()
        };
        assert!(matches!(
            check_update_permissions(&customer(), &request),
            Err(AppError::Forbidden(_))
        ));

        let admin = CurrentUser {
            role: Role::Admin,
            ..customer()
        };
        assert!(check_update_permissions(&admin, &request).is_ok());
    }

    #[test]
    fn test_store_description_only_keeps_name() {
        let request = UpdateUserRequest {
            store_description: Some("Handmade bags".into()),
            ..Default::default()
        };
        let store = request.parse(today()).unwrap().store.unwrap();
        assert!(store.store_name.is_none());
        assert_eq!(
            store.store_description,
            Some(Some("Handmade bags".to_string()))
        );
    }

    #[test]
    fn test_blank_store_name_rejected() {
        let request = UpdateUserRequest {
            store_name: Some("   ".into()),
            ..Default::default()
        };
        assert!(request.parse(today()).is_err());
    }
}
