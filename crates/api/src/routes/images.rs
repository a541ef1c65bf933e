//! Profile image and store logo handlers.
//!
//! Uploads follow the deployment's image storage: `binary` deployments take a
//! `multipart/form-data` body with a `file` field, `url` deployments take JSON
//! `{"url": "..."}`.

use axum::{
    Json, Router,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};

use marketplace_core::UserId;
use marketplace_core::aggregate::{AggregateError, ImageInfo, ImageSlot, ImageStorage, StoredImage};

use crate::db::{ImageRepository, ImageTarget};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::routes::require_owner_or_admin;
use crate::state::AppState;

/// Build the image router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/users/{id}/image",
            get(show_profile_image)
                .post(upload_profile_image)
                .delete(delete_profile_image),
        )
        .route("/users/{id}/image-info", get(profile_image_info))
        .route(
            "/store-owners/{id}/logo",
            get(show_store_logo)
                .post(upload_store_logo)
                .delete(delete_store_logo),
        )
        .route("/store-owners/{id}/logo-info", get(store_logo_info))
}

/// Image slot state after a change.
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    /// Whether the change emptied a previously filled slot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<bool>,
    pub image: Option<ImageInfo>,
}

#[derive(Debug, Deserialize)]
struct UrlUpload {
    url: String,
}

/// What the client sent, before it touches the slot.
#[derive(Debug)]
pub(crate) enum Upload {
    Binary {
        data: Vec<u8>,
        content_type: String,
        filename: Option<String>,
    },
    Url(String),
}

impl Upload {
    /// Put the upload into `slot`, replacing what was there.
    pub(crate) fn store_in(self, slot: &mut ImageSlot) -> std::result::Result<(), AggregateError> {
        match self {
            Self::Binary {
                data,
                content_type,
                filename,
            } => slot.set_binary(data, &content_type, filename),
            Self::Url(url) => slot.set_reference(&url),
        }
    }
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

/// Check a payload against the upload ceiling.
fn check_size(len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(AppError::PayloadTooLarge(format!(
            "image must be at most {max} bytes"
        )));
    }
    Ok(())
}

async fn read_multipart(mut multipart: Multipart, max: usize) -> Result<Upload> {
    let multipart_error = |e: axum::extract::multipart::MultipartError| {
        if e.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(format!("image must be at most {max} bytes"))
        } else {
            AppError::BadRequest(format!("invalid multipart body: {e}"))
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(str::to_owned)
            .ok_or_else(|| AppError::BadRequest("file part has no content type".to_string()))?;
        let filename = field.file_name().map(str::to_owned);
        let data = field.bytes().await.map_err(multipart_error)?;
        check_size(data.len(), max)?;
        return Ok(Upload::Binary {
            data: data.to_vec(),
            content_type,
            filename,
        });
    }
    Err(AppError::BadRequest("missing file field".to_string()))
}

pub(crate) async fn read_upload(state: &AppState, request: Request) -> Result<Upload> {
    let max = state.config().max_image_bytes;
    match (state.config().image_storage, is_multipart(&request)) {
        (ImageStorage::Binary, true) => {
            let multipart = Multipart::from_request(request, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            read_multipart(multipart, max).await
        }
        (ImageStorage::Url, false) => {
            let Json(body) = Json::<UrlUpload>::from_request(request, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(Upload::Url(body.url))
        }
        (ImageStorage::Binary, false) => Err(AppError::BadRequest(
            "this server stores images as files: send multipart/form-data with a file field"
                .to_string(),
        )),
        (ImageStorage::Url, true) => Err(AppError::BadRequest(
            "this server stores image links: send JSON with a url field".to_string(),
        )),
    }
}

async fn upload(
    state: &AppState,
    target: ImageTarget,
    owner: UserId,
    request: Request,
) -> Result<Json<ImageResponse>> {
    let upload = read_upload(state, request).await?;
    let ((), image) = ImageRepository::new(state.pool())
        .update_with(target, owner, move |slot| upload.store_in(slot))
        .await?;
    tracing::info!(%owner, ?target, "Image stored");
    Ok(Json(ImageResponse {
        removed: None,
        image,
    }))
}

async fn remove(state: &AppState, target: ImageTarget, owner: UserId) -> Result<Json<ImageResponse>> {
    let (removed, image) = ImageRepository::new(state.pool())
        .update_with(target, owner, |slot| Ok(slot.clear()))
        .await?;
    tracing::info!(%owner, ?target, removed, "Image removed");
    Ok(Json(ImageResponse {
        removed: Some(removed),
        image,
    }))
}

/// Disposition for served bytes: shown in place, saved under the stored name.
///
/// Quotes, backslashes and anything outside printable ASCII become `_`.
fn content_disposition(filename: Option<&str>) -> String {
    let name: String = filename
        .filter(|name| !name.trim().is_empty())
        .unwrap_or("image")
        .chars()
        .map(|c| {
            if c == '"' || c == '\\' || !(c.is_ascii_graphic() || c == ' ') {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("inline; filename=\"{name}\"")
}

/// The bytes of a stored image, or a redirect to a linked one.
pub(crate) fn stored_image_response(image: Option<&StoredImage>) -> Result<Response> {
    match image {
        Some(StoredImage::Binary(blob)) => Ok((
            [
                (header::CONTENT_TYPE, blob.content_type().to_owned()),
                (header::CONTENT_DISPOSITION, content_disposition(blob.filename())),
                (header::CACHE_CONTROL, "public, max-age=300".to_owned()),
            ],
            blob.data().to_vec(),
        )
            .into_response()),
        Some(StoredImage::Reference { url }) => Ok(Redirect::temporary(url).into_response()),
        None => Err(AppError::NotFound("Image".to_string())),
    }
}

/// Serve the image bytes, or redirect to a linked image.
async fn serve(state: &AppState, target: ImageTarget, owner: UserId) -> Result<Response> {
    let slot = ImageRepository::new(state.pool()).load(target, owner).await?;
    stored_image_response(slot.image())
}

async fn info(state: &AppState, target: ImageTarget, owner: UserId) -> Result<Json<ImageInfo>> {
    ImageRepository::new(state.pool())
        .info(target, owner)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Image".to_string()))
}

/// Upload or link a profile image. Self or admin.
///
/// # Errors
///
/// Returns 400 for a body that does not match the storage mode or an invalid
/// image, 413 for an oversized payload, 403 when not permitted.
pub async fn upload_profile_image(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<UserId>,
    request: Request,
) -> Result<Json<ImageResponse>> {
    require_owner_or_admin(&current, id)?;
    upload(&state, ImageTarget::ProfileImage, id, request).await
}

/// Remove a profile image. Removing nothing succeeds.
///
/// # Errors
///
/// Returns 403 when not permitted, 404 if the user does not exist.
pub async fn delete_profile_image(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<UserId>,
) -> Result<Json<ImageResponse>> {
    require_owner_or_admin(&current, id)?;
    remove(&state, ImageTarget::ProfileImage, id).await
}

/// Profile image bytes.
///
/// # Errors
///
/// Returns 404 if the user has no image.
pub async fn show_profile_image(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Response> {
    serve(&state, ImageTarget::ProfileImage, id).await
}

/// Profile image metadata.
///
/// # Errors
///
/// Returns 404 if the user has no image.
pub async fn profile_image_info(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<ImageInfo>> {
    info(&state, ImageTarget::ProfileImage, id).await
}

/// Upload or link a store logo. Store owner or admin.
///
/// # Errors
///
/// Same as [`upload_profile_image`], plus 404 unless `id` is a store owner.
pub async fn upload_store_logo(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<UserId>,
    request: Request,
) -> Result<Json<ImageResponse>> {
    require_owner_or_admin(&current, id)?;
    upload(&state, ImageTarget::StoreLogo, id, request).await
}

/// Remove a store logo.
///
/// # Errors
///
/// Returns 403 when not permitted, 404 unless `id` is a store owner.
pub async fn delete_store_logo(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<UserId>,
) -> Result<Json<ImageResponse>> {
    require_owner_or_admin(&current, id)?;
    remove(&state, ImageTarget::StoreLogo, id).await
}

/// Store logo bytes.
///
/// # Errors
///
/// Returns 404 if the store has no logo.
pub async fn show_store_logo(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Response> {
    serve(&state, ImageTarget::StoreLogo, id).await
}

/// Store logo metadata.
///
/// # Errors
///
/// Returns 404 if the store has no logo.
pub async fn store_logo_info(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<ImageInfo>> {
    info(&state, ImageTarget::StoreLogo, id).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_is_multipart() {
        let request = Request::builder()
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=x")
            .body(Body::empty())
            .unwrap();
        assert!(is_multipart(&request));

        let request = Request::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::empty())
            .unwrap();
        assert!(!is_multipart(&request));
    }

    #[test]
    fn test_size_ceiling() {
        assert!(check_size(10, 10).is_ok());
        assert!(matches!(
            check_size(11, 10),
            Err(AppError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn test_removed_flag_only_on_delete() {
        let body = serde_json::to_value(ImageResponse {
            removed: None,
            image: None,
        })
        .unwrap();
        assert!(body.get("removed").is_none());
        assert!(body["image"].is_null());
    }

    #[test]
    fn test_disposition_carries_stored_filename() {
        assert_eq!(
            content_disposition(Some("logo.png")),
            "inline; filename=\"logo.png\""
        );
        assert_eq!(content_disposition(None), "inline; filename=\"image\"");
        assert_eq!(
            content_disposition(Some("a\"b\r\nX-Evil: 1.png")),
            "inline; filename=\"a_b__X-Evil: 1.png\""
        );
    }

    #[test]
    fn test_binary_image_is_served_inline() {
        let slot = ImageSlot::restore_binary(
            vec![0x89, b'P', b'N', b'G'],
            Some("image/png".into()),
            Some("shop logo.png".into()),
            None,
        );
        let response = stored_image_response(slot.image()).unwrap();
        let headers = response.headers();
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "image/png");
        assert_eq!(
            headers.get(header::CONTENT_DISPOSITION).unwrap(),
            "inline; filename=\"shop logo.png\""
        );
    }

    #[test]
    fn test_svg_upload_leaves_slot_untouched() {
        let mut slot = ImageSlot::restore_binary(vec![1], Some("image/png".into()), None, None);
        let upload = Upload::Binary {
            data: br#"<svg onload="alert(1)"/>"#.to_vec(),
            content_type: "image/svg+xml".into(),
            filename: Some("logo.svg".into()),
        };
        assert!(upload.store_in(&mut slot).is_err());
        assert_eq!(
            slot.info().unwrap().content_type.as_deref(),
            Some("image/png")
        );
    }

    #[test]
    fn test_linked_image_redirects() {
        let slot = ImageSlot::with(StoredImage::Reference {
            url: "https://cdn.example.com/a.png".into(),
        });
        let response = stored_image_response(slot.image()).unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::TEMPORARY_REDIRECT);
        assert!(matches!(
            stored_image_response(None),
            Err(AppError::NotFound(_))
        ));
    }
}
