use axum::{Json, extract::State, http::StatusCode};
use uuid::Uuid;

use crate::{
    AppState,
    auth::MaybeSession,
    error::{ApiError, ApiResult, ErrorBody},
    extract::{ApiJson, ApiPath},
    guard::{Capability, require_admin, require_session},
    models::{Role, UpdateProfileRequest, UpdateRoleRequest, User},
};

/// get_me
///
/// [Authenticated Route] The caller's own profile, as currently stored.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Profile", body = User),
        (status = 401, description = "No session", body = ErrorBody)
    )
)]
pub async fn get_me(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
) -> ApiResult<Json<User>> {
    let session = require_session(session.as_ref())?;
    state
        .repo
        .get_user(session.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// get_user
///
/// [Authenticated Route] A customer profile.
///
/// *Authorization*: guard `read`; customers may only read themselves.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = User),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_user(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<User>> {
    let user = state
        .guard
        .authorize(session.as_ref(), Capability::Read, || state.repo.get_user(id))
        .await?;
    Ok(Json(user))
}

/// update_user
///
/// [Authenticated Route] Edits profile fields (name, image). The payload has
/// no role field, so this endpoint cannot be used to escalate.
#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_user(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    let user = state
        .guard
        .authorize(session.as_ref(), Capability::Write, || state.repo.get_user(id))
        .await?;

    let payload = UpdateProfileRequest {
        name: payload.name.map(|n| n.trim().to_string()),
        image: payload.image,
    };
    if matches!(&payload.name, Some(name) if name.is_empty()) {
        return Err(ApiError::bad_request("Name cannot be empty"));
    }

    state
        .repo
        .update_user_profile(user.id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User not found"))
}

// --- Customer management ---

/// list_users
#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Not Admin", body = ErrorBody)
    )
)]
pub async fn list_users(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<User>>> {
    require_admin(session.as_ref())?;
    Ok(Json(state.repo.list_users().await?))
}

/// update_user_role
///
/// [Admin Route] Promotes or demotes a user.
///
/// *Order of checks*: admin session, then the self-change rule (whatever body
/// is sent, even a malformed one), then the role value, then the target's
/// existence.
#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Own role or invalid role", body = ErrorBody),
        (status = 403, description = "Not Admin", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_user_role(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    payload: Result<ApiJson<UpdateRoleRequest>, ApiError>,
) -> ApiResult<Json<User>> {
    let session = require_admin(session.as_ref())?;
    state.guard.check_role_change(session, id)?;

    // The body is only inspected once the self-change rule has passed.
    let ApiJson(payload) = payload?;
    let role = Role::parse(&payload.role).ok_or_else(|| ApiError::bad_request("Invalid role"))?;

    let user = state
        .repo
        .set_user_role(id, role)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!(user_id = %user.id, role = %user.role, changed_by = %session.user_id, "role changed");
    Ok(Json(user))
}

/// delete_user
///
/// [Admin Route] Removes a customer together with their cart and orders.
/// Admins cannot delete their own account.
#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Own account", body = ErrorBody),
        (status = 403, description = "Not Admin", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_user(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    let admin = require_admin(session.as_ref())?;
    let user = state
        .guard
        .authorize(Some(admin), Capability::Delete, || state.repo.get_user(id))
        .await?;

    if admin.user_id == user.id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    if state.repo.delete_user(user.id).await? {
        tracing::info!(user_id = %user.id, "user deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("User not found"))
    }
}
