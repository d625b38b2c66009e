use async_trait::async_trait;
use serde::Deserialize;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use thiserror::Error;
use uuid::Uuid;

/// PaymentError
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("payment provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// PaymentStatus
///
/// Payment state of a hosted checkout session as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
    #[serde(other)]
    Unknown,
}

/// CheckoutSession
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted payment page. Absent once the session is complete.
    pub url: Option<String>,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub client_reference_id: Option<String>,
}

/// CheckoutLine
///
/// One priced line on the hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub name: String,
    pub unit_amount_cents: i64,
    pub quantity: i32,
}

/// NewCheckoutSession
///
/// Everything the provider needs to open a hosted payment page for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCheckoutSession {
    pub order_id: Uuid,
    pub customer_email: String,
    pub currency: String,
    pub lines: Vec<CheckoutLine>,
    pub success_url: String,
    pub cancel_url: String,
}

// 1. PaymentService Contract
/// PaymentService
///
/// The payment collaborator: creates hosted checkout sessions and reads them
/// back. Nothing here is retried; a failure surfaces to the caller.
#[async_trait]
pub trait PaymentService: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &NewCheckoutSession,
    ) -> Result<CheckoutSession, PaymentError>;

    async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, PaymentError>;
}

// 2. The Real Implementation (Stripe REST API)
/// StripeClient
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    message: String,
}

impl StripeClient {
    pub fn new(secret_key: &str, api_base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn parse_session(response: reqwest::Response) -> Result<CheckoutSession, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorEnvelope>()
                .await
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| status.to_string());
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<CheckoutSession>().await?)
    }
}

#[async_trait]
impl PaymentService for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &NewCheckoutSession,
    ) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&checkout_form(request))
            .send()
            .await?;

        Self::parse_session(response).await
    }

    async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .http
            .get(format!("{}/v1/checkout/sessions/{}", self.api_base, id))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        Self::parse_session(response).await
    }
}

/// checkout_form
///
/// Flattens a checkout request into the bracketed form encoding the Stripe
/// API expects (`line_items[0][price_data][currency]=usd`, ...).
pub fn checkout_form(request: &NewCheckoutSession) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("client_reference_id".to_string(), request.order_id.to_string()),
        ("customer_email".to_string(), request.customer_email.clone()),
        ("metadata[order_id]".to_string(), request.order_id.to_string()),
    ];

    for (i, line) in request.lines.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        form.push((
            format!("{prefix}[price_data][currency]"),
            request.currency.clone(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            line.name.clone(),
        ));
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            line.unit_amount_cents.to_string(),
        ));
        form.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
    }

    form
}

// 3. The Mock Implementation (For Tests)
/// MockPaymentService
///
/// Keeps sessions in memory. Sessions start `unpaid`; tests flip them with
/// `mark_paid`.
#[derive(Default)]
pub struct MockPaymentService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    sessions: Mutex<HashMap<String, CheckoutSession>>,
}

impl MockPaymentService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn mark_paid(&self, id: &str) {
        if let Ok(mut sessions) = self.sessions.lock() {
            if let Some(session) = sessions.get_mut(id) {
                session.payment_status = PaymentStatus::Paid;
            }
        }
    }

    fn check(&self) -> Result<(), PaymentError> {
        if self.should_fail {
            return Err(PaymentError::Rejected {
                status: 500,
                message: "Mock Payment Error: Simulation requested".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentService for MockPaymentService {
    async fn create_checkout_session(
        &self,
        request: &NewCheckoutSession,
    ) -> Result<CheckoutSession, PaymentError> {
        self.check()?;
        let id = format!("cs_test_{}", Uuid::new_v4().simple());
        let session = CheckoutSession {
            url: Some(format!("https://checkout.test/pay/{}", id)),
            id: id.clone(),
            payment_status: PaymentStatus::Unpaid,
            client_reference_id: Some(request.order_id.to_string()),
        };
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(id, session.clone());
        }
        Ok(session)
    }

    async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, PaymentError> {
        self.check()?;
        self.sessions
            .lock()
            .ok()
            .and_then(|sessions| sessions.get(id).cloned())
            .ok_or_else(|| PaymentError::Rejected {
                status: 404,
                message: format!("No such checkout session: {}", id),
            })
    }
}

/// PaymentState
pub type PaymentState = Arc<dyn PaymentService>;
