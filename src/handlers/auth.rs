use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;

use crate::{
    AppState,
    error::{ApiError, ApiResult, ErrorBody},
    extract::ApiJson,
    models::{RegisterUserRequest, Role, User},
};

/// register_user
///
/// [Public Route] Creates the account with the external identity provider, then
/// mirrors it in the local `users` table under the provider's id.
///
/// *Security*: the role is always `USER`. Promotion happens only through the
/// admin role endpoint. The password is forwarded and never stored or logged.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = User),
        (status = 400, description = "Invalid input or rejected by the provider", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    payload.validate()?;
    let email = payload.email.trim().to_lowercase();

    if state.repo.get_user_by_email(&email).await?.is_some() {
        return Err(ApiError::conflict("Email is already registered"));
    }

    // Step 1: the provider owns the credentials and the canonical id.
    let id = state.identity.sign_up(&email, &payload.password).await?;

    // Step 2: local mirror, keyed by the provider's id.
    let name = payload
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let user = state
        .repo
        .create_user(User {
            id,
            email,
            name,
            image: None,
            role: Role::User,
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}
