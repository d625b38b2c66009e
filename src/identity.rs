use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

/// IdentityError
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider refused the sign-up (duplicate email, weak password, ...).
    /// Surfaces as a 400 carrying the provider's message.
    #[error("{0}")]
    Rejected(String),

    #[error("identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

// 1. IdentityProvider Contract
/// IdentityProvider
///
/// The external auth service that owns credentials and issues session tokens.
/// This backend only asks it to create accounts and mirrors the returned id.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates the account and returns the provider's canonical user id.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Uuid, IdentityError>;
}

// 2. The Real Implementation (Supabase-compatible GoTrue API)
/// SupabaseIdentityClient
#[derive(Clone)]
pub struct SupabaseIdentityClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// SignUpResponse
///
/// Only the new user's UUID is needed from the sign-up response. Depending on
/// the provider's confirmation settings it is either top-level or nested
/// under `user`.
#[derive(Deserialize)]
struct SignUpResponse {
    id: Option<Uuid>,
    user: Option<SignUpUser>,
}

#[derive(Deserialize)]
struct SignUpUser {
    id: Uuid,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    #[serde(alias = "msg", alias = "error_description")]
    message: Option<String>,
}

impl SupabaseIdentityClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityClient {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Uuid, IdentityError> {
        let response = self
            .http
            .post(format!("{}/auth/v1/signup", self.base_url))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ProviderErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| "Registration was rejected".to_string());
            tracing::debug!(status = %status, "identity provider rejected sign-up");
            return Err(IdentityError::Rejected(message));
        }

        let body = response.json::<SignUpResponse>().await?;
        body.id
            .or(body.user.map(|user| user.id))
            .ok_or_else(|| IdentityError::Unavailable("sign-up response carried no user id".to_string()))
    }
}

// 3. The Mock Implementation (For Tests)
/// MockIdentityProvider
///
/// Issues fresh UUIDs and refuses emails it has already seen, like the real
/// provider does.
#[derive(Default)]
pub struct MockIdentityProvider {
    /// When true, sign-up fails as if the provider were down.
    pub should_fail: bool,
    emails: Mutex<Vec<String>>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn sign_up(&self, email: &str, _password: &str) -> Result<Uuid, IdentityError> {
        if self.should_fail {
            return Err(IdentityError::Unavailable(
                "Mock Identity Error: Simulation requested".to_string(),
            ));
        }
        let mut emails = self
            .emails
            .lock()
            .map_err(|_| IdentityError::Unavailable("mock state poisoned".to_string()))?;
        if emails.iter().any(|e| e.eq_ignore_ascii_case(email)) {
            return Err(IdentityError::Rejected("User already registered".to_string()));
        }
        emails.push(email.to_string());
        Ok(Uuid::new_v4())
    }
}

/// IdentityState
pub type IdentityState = Arc<dyn IdentityProvider>;
