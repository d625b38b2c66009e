use pettech_store::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    identity::{IdentityState, SupabaseIdentityClient},
    payment::{PaymentState, StripeClient},
    repository::{PostgresRepository, RepositoryState},
    storage::{ImageStore, S3ImageStore, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database (with migrations), external
/// collaborators, then the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pettech_store=debug,tower_http=info,axum=trace".into());

    // 3. Log format per environment: pretty locally, JSON for aggregation in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!(
        "Application starting in {:?} mode (disclosure: {:?})",
        config.env,
        config.disclosure
    );

    // 4. Database (Postgres) and schema migrations
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Database migrations failed.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. Image hosting (S3/MinIO)
    let image_store = S3ImageStore::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
        &config.media_base_url,
    );

    // LOCAL-ONLY: provision the MinIO bucket.
    if config.env == Env::Local {
        image_store.ensure_bucket_exists().await;
    }
    let storage = Arc::new(image_store) as StorageState;

    // 6. Payment and identity providers
    let payments = Arc::new(StripeClient::new(
        &config.stripe_secret_key,
        &config.stripe_api_base,
    )) as PaymentState;
    let identity = Arc::new(SupabaseIdentityClient::new(
        &config.auth_url,
        &config.auth_key,
    )) as IdentityState;

    // 7. Unified State, Router and Server
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(repo, storage, payments, identity, config));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
