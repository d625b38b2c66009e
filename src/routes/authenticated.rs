use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Authenticated Router Module
///
/// Customer features: cart, checkout, orders and profile.
///
/// Access Control Strategy:
/// The whole router sits behind the session layer (see `create_router`), so a
/// request without a valid session never reaches a handler. Ownership is then
/// decided per resource by the authorization guard inside each handler.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Profile ---
        // GET /api/me
        .route("/me", get(handlers::users::get_me))
        // GET/PATCH /api/users/{id}
        // Owner or admin only; the PATCH body cannot carry a role.
        .route(
            "/users/{id}",
            get(handlers::users::get_user).patch(handlers::users::update_user),
        )
        // --- Cart ---
        .route(
            "/cart",
            get(handlers::cart::get_cart).delete(handlers::cart::clear_cart),
        )
        .route("/cart/items", post(handlers::cart::add_cart_item))
        // PATCH/DELETE /api/cart/items/{id}
        // Guarded by cart ownership.
        .route(
            "/cart/items/{id}",
            patch(handlers::cart::update_cart_item).delete(handlers::cart::remove_cart_item),
        )
        // --- Checkout & Orders ---
        .route("/checkout", post(handlers::orders::checkout))
        .route("/checkout/confirm", post(handlers::orders::confirm_checkout))
        .route("/orders", get(handlers::orders::list_my_orders))
        .route("/orders/{id}", get(handlers::orders::get_order))
}
