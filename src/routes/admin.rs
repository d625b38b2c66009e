use crate::{AppState, handlers, storage::MAX_UPLOAD_BYTES};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
};

/// Admin Router Module
///
/// Catalog management, order and customer oversight, dashboard statistics and
/// image upload. Mounted under `/api/admin` behind the session layer; every
/// handler additionally requires the ADMIN role (403 otherwise).
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin/stats
        .route("/stats", get(handlers::admin::get_admin_stats))
        // --- Catalog ---
        .route("/categories", post(handlers::catalog::create_category))
        .route(
            "/categories/{id}",
            put(handlers::catalog::update_category).delete(handlers::catalog::delete_category),
        )
        .route("/products", post(handlers::catalog::create_product))
        .route(
            "/products/{id}",
            put(handlers::catalog::update_product).delete(handlers::catalog::delete_product),
        )
        // --- Orders ---
        .route("/orders", get(handlers::orders::list_all_orders))
        .route("/orders/{id}", delete(handlers::orders::delete_order))
        // PATCH /api/admin/orders/{id}/status
        // Only transitions the order lifecycle allows are accepted.
        .route(
            "/orders/{id}/status",
            patch(handlers::orders::update_order_status),
        )
        // --- Customers ---
        .route("/users", get(handlers::users::list_users))
        .route("/users/{id}", delete(handlers::users::delete_user))
        // PATCH /api/admin/users/{id}/role
        // Nobody may change their own role.
        .route("/users/{id}/role", patch(handlers::users::update_user_role))
        // POST /api/admin/upload
        // Base64 inflates the 5 MiB image limit by a third, plus JSON framing.
        .route(
            "/upload",
            post(handlers::media::upload_image)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES / 3 * 4 + 64 * 1024)),
        )
}
