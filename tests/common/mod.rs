#![allow(dead_code)]

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use pettech_store::{
    AppConfig, AppState,
    auth::{Claims, Session},
    identity::MockIdentityProvider,
    models::{CreateProductRequest, NewOrder, NewOrderItem, Order, Product, Role, User},
    payment::MockPaymentService,
    repository::{MemoryRepository, Repository},
    storage::MockImageStore,
};
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;

// --- Shared test harness ---

/// Application state over in-memory collaborators, with handles kept to the
/// concrete mocks so tests can seed and inspect them.
pub struct TestContext {
    pub state: AppState,
    pub repo: Arc<MemoryRepository>,
    pub storage: Arc<MockImageStore>,
    pub payments: Arc<MockPaymentService>,
}

pub fn test_context() -> TestContext {
    test_context_with(AppConfig::default(), MockPaymentService::new())
}

pub fn test_context_with(config: AppConfig, payments: MockPaymentService) -> TestContext {
    let repo = Arc::new(MemoryRepository::new());
    let storage = Arc::new(MockImageStore::new());
    let payments = Arc::new(payments);
    let state = AppState::new(
        repo.clone(),
        storage.clone(),
        payments.clone(),
        Arc::new(MockIdentityProvider::new()),
        config,
    );
    TestContext {
        state,
        repo,
        storage,
        payments,
    }
}

pub async fn seed_user(repo: &MemoryRepository, email: &str, role: Role) -> User {
    repo.create_user(User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        name: None,
        image: None,
        role,
        created_at: Utc::now(),
    })
    .await
    .unwrap()
}

pub async fn seed_product(repo: &MemoryRepository, name: &str, price_cents: i64, stock: i32) -> Product {
    repo.create_product(CreateProductRequest {
        name: name.to_string(),
        description: format!("{name} for happy pets"),
        price_cents,
        stock,
        ..CreateProductRequest::default()
    })
    .await
    .unwrap()
}

pub async fn seed_order(repo: &MemoryRepository, user_id: Uuid, total_cents: i64) -> Order {
    repo.create_order(NewOrder {
        user_id,
        total_cents,
        shipping_address: None,
        items: vec![NewOrderItem {
            product_id: Uuid::new_v4(),
            product_name: "Smart Feeder".to_string(),
            unit_price_cents: total_cents,
            quantity: 1,
        }],
    })
    .await
    .unwrap()
}

pub fn session_for(user: &User) -> Session {
    Session::from(user)
}

fn now() -> usize {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
}

/// Signs a session token for `user`, valid for one hour.
pub fn token_for(user: &User, secret: &str) -> String {
    token_with_exp(user, secret, now() + 3600)
}

/// Signs a token that expired an hour ago (well outside any leeway).
pub fn expired_token_for(user: &User, secret: &str) -> String {
    token_with_exp(user, secret, now() - 3600)
}

fn token_with_exp(user: &User, secret: &str, exp: usize) -> String {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        exp,
        iat: now(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// Renders any handler output and parses its JSON body.
pub async fn json_body<R: IntoResponse>(response: R) -> (axum::http::StatusCode, serde_json::Value) {
    let response: Response<Body> = response.into_response();
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (parts.status, value)
}
