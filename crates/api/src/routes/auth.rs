//! Authentication route handlers.
//!
//! Registration logs the new user in straight away.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde::Deserialize;
use tower_sessions::Session;

use marketplace_core::model::User;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::routes::users::{UserResponse, user_response};
use crate::services::auth::{AuthService, Registration, StoreRegistration};
use crate::state::AppState;

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/register/store-owner", post(register_store_owner))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

async fn start_session(
    state: &AppState,
    session: &Session,
    user: User,
) -> Result<UserResponse> {
    let current = CurrentUser::from(&user);
    set_current_user(session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    set_sentry_user(&current.id);
    user_response(state, user).await
}

/// Register a customer.
///
/// # Errors
///
/// Returns 400 for invalid fields, 409 if the phone or email is taken.
#[tracing::instrument(skip(state, session, form), fields(phone = %form.phone))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<Registration>,
) -> Result<impl IntoResponse> {
    let user = AuthService::new(state.pool())
        .register_customer(&form)
        .await?;
    tracing::info!(user_id = %user.profile.id, "Customer registered");

    let body = start_session(&state, &session, user).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

/// Register a store owner with their store.
///
/// # Errors
///
/// Returns 400 for invalid fields, 409 if the phone or email is taken.
#[tracing::instrument(skip(state, session, form), fields(phone = %form.account.phone))]
pub async fn register_store_owner(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<StoreRegistration>,
) -> Result<impl IntoResponse> {
    let user = AuthService::new(state.pool())
        .register_store_owner(&form)
        .await?;
    tracing::info!(user_id = %user.profile.id, "Store owner registered");

    let body = start_session(&state, &session, user).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

/// Log in with phone number and password.
///
/// # Errors
///
/// Returns 401 for a wrong phone or password, 403 for a disabled account.
#[tracing::instrument(skip(state, session, body))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<UserResponse>> {
    let user = AuthService::new(state.pool())
        .login(&body.phone, &body.password)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Login failed"))?;

    let response = start_session(&state, &session, user).await?;
    tracing::info!(user_id = %response.user.profile.id, "User logged in");
    Ok(Json(response))
}

/// Log out and drop the session.
///
/// # Errors
///
/// Returns 500 if the session store fails.
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}
