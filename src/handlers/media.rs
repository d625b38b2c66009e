use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    auth::MaybeSession,
    error::{ApiError, ApiResult, ErrorBody},
    extract::ApiJson,
    guard::require_admin,
    models::{UploadImageRequest, UploadImageResponse},
    storage::{decode_image_payload, object_key},
};

/// upload_image
///
/// [Admin Route] Stores a base64-encoded product image and returns its public
/// URL and the file id needed to delete it later.
///
/// *Security*: the decoded size is capped at 5 MiB, and the object key is built
/// from a fresh UUID plus a sanitized file name so clients cannot choose or
/// traverse paths.
#[utoipa::path(
    post,
    path = "/api/admin/upload",
    request_body = UploadImageRequest,
    responses(
        (status = 201, description = "Uploaded", body = UploadImageResponse),
        (status = 400, description = "Invalid or oversized image", body = ErrorBody),
        (status = 403, description = "Not Admin", body = ErrorBody)
    )
)]
pub async fn upload_image(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UploadImageRequest>,
) -> ApiResult<(StatusCode, Json<UploadImageResponse>)> {
    require_admin(session.as_ref())?;

    if payload.file_name.trim().is_empty() {
        return Err(ApiError::bad_request("File name is required"));
    }

    let image = decode_image_payload(&payload.data, &payload.file_name)?;
    let key = object_key(payload.folder.as_deref(), &payload.file_name);
    let size = image.bytes.len();

    let stored = state.storage.put_image(&key, image).await?;

    tracing::info!(file_id = %stored.file_id, size, "image uploaded");
    Ok((
        StatusCode::CREATED,
        Json(UploadImageResponse {
            url: stored.url,
            file_id: stored.file_id,
        }),
    ))
}
