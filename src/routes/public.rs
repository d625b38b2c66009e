use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Everything here is read-only apart
/// from registration, which delegates account creation to the identity provider.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /api/auth/register
        // Creates the account with the identity provider and mirrors it locally
        // with role USER.
        .route("/auth/register", post(handlers::auth::register_user))
        // GET /api/products?category=...&search=...&featured=...
        .route("/products", get(handlers::catalog::list_products))
        .route("/products/{id}", get(handlers::catalog::get_product))
        .route("/categories", get(handlers::catalog::list_categories))
        .route("/categories/{id}", get(handlers::catalog::get_category))
}
