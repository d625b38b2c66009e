use pettech_store::payment::{
    CheckoutLine, CheckoutSession, MockPaymentService, NewCheckoutSession, PaymentError,
    PaymentService, PaymentStatus, StripeClient, checkout_form,
};
use uuid::Uuid;

fn new_session() -> NewCheckoutSession {
    NewCheckoutSession {
        order_id: Uuid::new_v4(),
        customer_email: "owner@pettech.test".to_string(),
        currency: "usd".to_string(),
        lines: vec![
            CheckoutLine {
                name: "Smart Feeder".to_string(),
                unit_amount_cents: 2_500,
                quantity: 2,
            },
            CheckoutLine {
                name: "GPS Collar".to_string(),
                unit_amount_cents: 8_900,
                quantity: 1,
            },
        ],
        success_url: "http://localhost:3000/checkout/success?session_id={CHECKOUT_SESSION_ID}"
            .to_string(),
        cancel_url: "http://localhost:3000/cart".to_string(),
    }
}

fn form_value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
    form.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[test]
fn test_checkout_form_encodes_every_line() {
    let request = new_session();
    let form = checkout_form(&request);
    let order_id = request.order_id.to_string();

    assert_eq!(form_value(&form, "mode"), Some("payment"));
    assert_eq!(form_value(&form, "client_reference_id"), Some(order_id.as_str()));
    assert_eq!(form_value(&form, "metadata[order_id]"), Some(order_id.as_str()));
    assert_eq!(form_value(&form, "customer_email"), Some("owner@pettech.test"));
    assert_eq!(
        form_value(&form, "line_items[0][price_data][product_data][name]"),
        Some("Smart Feeder")
    );
    assert_eq!(form_value(&form, "line_items[0][quantity]"), Some("2"));
    assert_eq!(
        form_value(&form, "line_items[1][price_data][unit_amount]"),
        Some("8900")
    );
    assert_eq!(
        form_value(&form, "line_items[1][price_data][currency]"),
        Some("usd")
    );
    assert_eq!(form_value(&form, "line_items[2][quantity]"), None);
}

#[test]
fn test_checkout_session_deserialization() {
    let session: CheckoutSession = serde_json::from_value(serde_json::json!({
        "id": "cs_test_123",
        "object": "checkout.session",
        "url": null,
        "payment_status": "no_payment_required"
    }))
    .unwrap();
    assert_eq!(session.payment_status, PaymentStatus::NoPaymentRequired);
    assert_eq!(session.url, None);
    assert_eq!(session.client_reference_id, None);

    let future: CheckoutSession = serde_json::from_value(serde_json::json!({
        "id": "cs_test_456",
        "url": "https://checkout.stripe.com/c/pay/cs_test_456",
        "payment_status": "partially_refunded_someday"
    }))
    .unwrap();
    assert_eq!(future.payment_status, PaymentStatus::Unknown);
}

#[tokio::test]
async fn test_mock_session_lifecycle() {
    let mock = MockPaymentService::new();
    let request = new_session();

    let created = mock.create_checkout_session(&request).await.unwrap();
    assert!(created.id.starts_with("cs_test_"));
    assert_eq!(created.payment_status, PaymentStatus::Unpaid);
    assert_eq!(
        created.client_reference_id,
        Some(request.order_id.to_string())
    );

    mock.mark_paid(&created.id);
    let fetched = mock.retrieve_checkout_session(&created.id).await.unwrap();
    assert_eq!(fetched.payment_status, PaymentStatus::Paid);

    let missing = mock.retrieve_checkout_session("cs_test_nope").await;
    assert!(matches!(missing, Err(PaymentError::Rejected { status: 404, .. })));
}

#[tokio::test]
async fn test_mock_failure() {
    let mock = MockPaymentService::new_failing();
    let result = mock.create_checkout_session(&new_session()).await;
    assert!(matches!(result, Err(PaymentError::Rejected { status: 500, .. })));
}

/// Serves a minimal stand-in for the provider's checkout session endpoints.
async fn spawn_provider() -> String {
    use axum::{Json, Router, extract::Path, http::StatusCode, routing::{get, post}};

    let router = Router::new()
        .route(
            "/v1/checkout/sessions",
            post(|body: String| async move {
                assert!(body.contains("mode=payment"));
                Json(serde_json::json!({
                    "id": "cs_test_stub",
                    "url": "https://checkout.stripe.test/pay/cs_test_stub",
                    "payment_status": "unpaid"
                }))
            }),
        )
        .route(
            "/v1/checkout/sessions/{id}",
            get(|Path(id): Path<String>| async move {
                (
                    StatusCode::NOT_FOUND,
                    Json(serde_json::json!({
                        "error": { "message": format!("No such checkout.session: '{id}'") }
                    })),
                )
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    address
}

#[tokio::test]
async fn test_stripe_client_against_stub_provider() {
    let base = spawn_provider().await;
    let client = StripeClient::new("sk_test_local", &format!("{base}/"));

    let created = client.create_checkout_session(&new_session()).await.unwrap();
    assert_eq!(created.id, "cs_test_stub");
    assert_eq!(created.payment_status, PaymentStatus::Unpaid);

    match client.retrieve_checkout_session("cs_test_gone").await {
        Err(PaymentError::Rejected { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "No such checkout.session: 'cs_test_gone'");
        }
        other => panic!("expected a rejection, got {:?}", other),
    }
}
