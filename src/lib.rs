use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Authorization core.
pub mod auth;
pub mod gatekeeper;
pub mod guard;

// Application services and collaborators.
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod payment;
pub mod repository;
pub mod storage;

// Routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::MaybeSession;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use gatekeeper::Gatekeeper;
pub use guard::ResourceGuard;
pub use identity::{IdentityState, MockIdentityProvider, SupabaseIdentityClient};
pub use payment::{MockPaymentService, PaymentState, StripeClient};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockImageStore, S3ImageStore, StorageState};

/// ApiDoc
///
/// Auto-generated OpenAPI document for the JSON API, served at
/// `/api-docs/openapi.json` and rendered by Swagger UI.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register_user,
        handlers::catalog::list_products, handlers::catalog::get_product,
        handlers::catalog::list_categories, handlers::catalog::get_category,
        handlers::catalog::create_category, handlers::catalog::update_category,
        handlers::catalog::delete_category, handlers::catalog::create_product,
        handlers::catalog::update_product, handlers::catalog::delete_product,
        handlers::cart::get_cart, handlers::cart::add_cart_item,
        handlers::cart::update_cart_item, handlers::cart::remove_cart_item,
        handlers::cart::clear_cart,
        handlers::orders::checkout, handlers::orders::confirm_checkout,
        handlers::orders::list_my_orders, handlers::orders::get_order,
        handlers::orders::list_all_orders, handlers::orders::update_order_status,
        handlers::orders::delete_order,
        handlers::users::get_me, handlers::users::get_user, handlers::users::update_user,
        handlers::users::list_users, handlers::users::update_user_role,
        handlers::users::delete_user,
        handlers::admin::get_admin_stats,
        handlers::media::upload_image,
    ),
    components(
        schemas(
            models::Role, models::OrderStatus, models::User, models::Category, models::Product,
            models::CartItem, models::CartLine, models::CartView, models::Order,
            models::OrderItem, models::OrderDetail, models::RegisterUserRequest,
            models::UpdateProfileRequest, models::UpdateRoleRequest,
            models::CreateCategoryRequest, models::UpdateCategoryRequest,
            models::CreateProductRequest, models::UpdateProductRequest,
            models::AddCartItemRequest, models::UpdateCartItemRequest,
            models::CheckoutRequest, models::CheckoutResponse, models::ConfirmCheckoutRequest,
            models::UpdateOrderStatusRequest, models::UploadImageRequest,
            models::UploadImageResponse, models::AdminDashboardStats, error::ErrorBody,
        )
    ),
    tags(
        (name = "pettech-store", description = "Pet-tech storefront API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The **Unified State Pattern**: one cloneable container for every service the
/// handlers need. Collaborators sit behind trait objects so tests can swap in
/// the in-memory implementations.
#[derive(Clone)]
pub struct AppState {
    /// Persistence (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// Image hosting (S3/MinIO).
    pub storage: StorageState,
    /// Hosted checkout (Stripe).
    pub payments: PaymentState,
    /// Account creation with the external identity provider.
    pub identity: IdentityState,
    /// Edge gatekeeper with its route table, built once at startup.
    pub gatekeeper: Arc<Gatekeeper>,
    /// Resource authorization guard.
    pub guard: ResourceGuard,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl AppState {
    /// new
    ///
    /// Assembles the state with the storefront route table and a guard using
    /// the configured disclosure policy.
    pub fn new(
        repo: RepositoryState,
        storage: StorageState,
        payments: PaymentState,
        identity: IdentityState,
        config: AppConfig,
    ) -> Self {
        Self {
            repo,
            storage,
            payments,
            identity,
            gatekeeper: Arc::new(Gatekeeper::default()),
            guard: ResourceGuard::new(config.disclosure),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// session_layer
///
/// Middleware for the authenticated and admin routers. Resolves the session
/// once, stores it in the request extensions for the handler's `MaybeSession`,
/// and answers 401 when there is none.
async fn session_layer(
    MaybeSession(session): MaybeSession,
    mut request: Request,
    next: Next,
) -> Response {
    match session {
        Some(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        None => ApiError::unauthorized("Unauthorized").into_response(),
    }
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware, and
/// registers the application state.
///
/// Layer order, outermost first: CORS, request id, tracing, request id
/// propagation, edge gatekeeper, then routing.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. API Router Assembly
    let api = Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                session_layer,
            )),
        )
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                session_layer,
            )),
        );

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // GET /health: liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        .fallback(handlers::not_found)
        // 3. Edge Gatekeeper: every request, including unknown paths.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gatekeeper::edge_gatekeeper,
        ))
        .with_state(state);

    // 4. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer` carrying method, uri and the `x-request-id` so every
/// log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
