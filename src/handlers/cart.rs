use axum::{Json, extract::State, http::StatusCode};
use uuid::Uuid;

use crate::{
    AppState,
    auth::MaybeSession,
    error::{ApiError, ApiResult, ErrorBody},
    extract::{ApiJson, ApiPath},
    guard::{Capability, require_session},
    models::{AddCartItemRequest, CartItem, CartView, MAX_LINE_QUANTITY, UpdateCartItemRequest},
};

fn quantity_limit_message() -> String {
    format!("Quantity cannot exceed {MAX_LINE_QUANTITY}")
}

fn validate_quantity(quantity: i32) -> ApiResult<()> {
    if quantity < 1 {
        return Err(ApiError::bad_request("Quantity must be at least 1"));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(ApiError::bad_request(quantity_limit_message()));
    }
    Ok(())
}

/// get_cart
///
/// [Authenticated Route] The caller's cart with priced lines and total. The
/// cart row is created on first access.
#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart", body = CartView),
        (status = 401, description = "No session", body = ErrorBody)
    )
)]
pub async fn get_cart(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
) -> ApiResult<Json<CartView>> {
    let session = require_session(session.as_ref())?;
    let cart = state.repo.get_or_create_cart(session.user_id).await?;
    let lines = state.repo.get_cart_lines(cart.id).await?;
    Ok(Json(CartView::new(cart.id, lines)))
}

/// add_cart_item
///
/// [Authenticated Route] Adds a product to the caller's cart. Adding a product
/// already in the cart increases its quantity, up to the per-line maximum.
#[utoipa::path(
    post,
    path = "/api/cart/items",
    request_body = AddCartItemRequest,
    responses(
        (status = 201, description = "Added", body = CartItem),
        (status = 400, description = "Invalid quantity", body = ErrorBody),
        (status = 404, description = "Unknown product", body = ErrorBody)
    )
)]
pub async fn add_cart_item(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<AddCartItemRequest>,
) -> ApiResult<(StatusCode, Json<CartItem>)> {
    let session = require_session(session.as_ref())?;
    let quantity = payload.quantity.unwrap_or(1);
    validate_quantity(quantity)?;

    if state.repo.get_product(payload.product_id).await?.is_none() {
        return Err(ApiError::not_found("Product not found"));
    }

    let cart = state.repo.get_or_create_cart(session.user_id).await?;
    let item = state
        .repo
        .add_cart_item(cart.id, payload.product_id, quantity)
        .await
        .map_err(|err| {
            if err.is_out_of_range() {
                ApiError::bad_request(quantity_limit_message())
            } else {
                ApiError::from(err)
            }
        })?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// update_cart_item
///
/// [Authenticated Route] Sets the quantity of one line.
///
/// *Authorization*: guard `write` on the cart item; the owner is the user the
/// cart belongs to.
#[utoipa::path(
    patch,
    path = "/api/cart/items/{id}",
    params(("id" = Uuid, Path, description = "Cart item ID")),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Updated", body = CartItem),
        (status = 400, description = "Invalid quantity", body = ErrorBody),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_cart_item(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateCartItemRequest>,
) -> ApiResult<Json<CartItem>> {
    let item = state
        .guard
        .authorize(session.as_ref(), Capability::Write, || state.repo.get_cart_item(id))
        .await?;
    validate_quantity(payload.quantity)?;

    state
        .repo
        .set_cart_item_quantity(item.id, payload.quantity)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Cart item not found"))
}

/// remove_cart_item
///
/// [Authenticated Route] Owners may delete their own cart lines.
#[utoipa::path(
    delete,
    path = "/api/cart/items/{id}",
    params(("id" = Uuid, Path, description = "Cart item ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn remove_cart_item(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    let item = state
        .guard
        .authorize(session.as_ref(), Capability::Delete, || state.repo.get_cart_item(id))
        .await?;

    if state.repo.delete_cart_item(item.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        // Removed concurrently between the check and the delete.
        Err(ApiError::not_found("Cart item not found"))
    }
}

/// clear_cart
#[utoipa::path(
    delete,
    path = "/api/cart",
    responses(
        (status = 204, description = "Cleared"),
        (status = 401, description = "No session", body = ErrorBody)
    )
)]
pub async fn clear_cart(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
) -> ApiResult<StatusCode> {
    let session = require_session(session.as_ref())?;
    let cart = state.repo.get_or_create_cart(session.user_id).await?;
    let removed = state.repo.clear_cart(cart.id).await?;
    tracing::debug!(cart_id = %cart.id, removed, "cart cleared");
    Ok(StatusCode::NO_CONTENT)
}
