/// Request handlers, grouped by the part of the storefront they serve.
///
/// Every handler receives the caller's session explicitly (`MaybeSession`) and
/// hands it to the authorization guard before touching a resource. Handlers
/// return `ApiResult`, so every failure leaves as `{ "error": "..." }`.
pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod media;
pub mod orders;
pub mod users;

use crate::error::ApiError;

/// not_found
///
/// Router fallback for unknown paths.
pub async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}
