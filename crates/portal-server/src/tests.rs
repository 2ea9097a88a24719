//! Router tests against mock Stripe and backend

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use portal_backend::{Backend, MockBackend, Service};
use portal_payments::{BillingProvider, MockBilling, StripeConfig};
use serde_json::{Value, json};
use sha2::Sha256;
use tower::ServiceExt;

use crate::config::ServerConfig;
use crate::router;
use crate::state::AppState;

const WEBHOOK_SECRET: &str = "whsec_router_test";

fn app(backend: Arc<MockBackend>, billing: Option<Arc<MockBilling>>) -> Router {
    let stripe = StripeConfig {
        secret_key: None,
        publishable_key: Some("pk_test_123".into()),
        webhook_secret: Some(WEBHOOK_SECRET.into()),
    };
    let backend: Arc<dyn Backend> = backend;
    let billing = billing.map(|b| b as Arc<dyn BillingProvider>);
    router::build(AppState::new(backend, billing, &ServerConfig::default(), &stripe))
}

async fn call(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();

    call_raw(app, request).await
}

fn tuition_invoice() -> Value {
    json!({
        "studentId": "S-1001",
        "studentName": "Ada Student",
        "studentEmail": "ada@example.edu",
        "items": [{"description": "Tuition", "amount": 500.00, "quantity": 1}]
    })
}

#[tokio::test]
async fn invoice_missing_fields_is_400_without_stripe_calls() {
    let billing = Arc::new(MockBilling::new());

    for field in ["studentId", "studentName", "studentEmail", "items"] {
        let mut body = tuition_invoice();
        body.as_object_mut().unwrap().remove(field);

        let (status, json) = call(
            app(Arc::new(MockBackend::new()), Some(billing.clone())),
            Method::POST,
            "/api/invoices",
            Some(body),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "missing {field}");
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains(field));
    }

    assert!(billing.calls().await.is_empty());
}

#[tokio::test]
async fn invoice_created_in_minor_units() {
    let billing = Arc::new(MockBilling::new());
    let (status, json) = call(
        app(Arc::new(MockBackend::new()), Some(billing.clone())),
        Method::POST,
        "/api/invoices",
        Some(tuition_invoice()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["amountDue"], 500.0);
    assert!(json["invoiceId"].as_str().unwrap().starts_with("in_"));
    assert!(json["hostedInvoiceUrl"].is_string());
    assert_eq!(billing.lines().await[0].unit_amount, 50000);
}

#[tokio::test]
async fn payment_intent_returns_client_secret() {
    let billing = Arc::new(MockBilling::new());
    let (status, json) = call(
        app(Arc::new(MockBackend::new()), Some(billing)),
        Method::POST,
        "/api/payments/intent",
        Some(json!({"amount": 10.005, "currency": "usd", "studentId": "S-1001"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["amount"], 1001);
    assert!(json["clientSecret"].as_str().unwrap().contains("secret"));
}

#[tokio::test]
async fn payments_unavailable_without_stripe() {
    let (status, json) = call(
        app(Arc::new(MockBackend::new()), None),
        Method::POST,
        "/api/payments/intent",
        Some(json!({"amount": 10, "studentId": "S-1"})),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn payment_history_fails_soft() {
    let (status, json) = call(
        app(Arc::new(MockBackend::unavailable()), None),
        Method::GET,
        "/api/payments/history?studentId=S-1001",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"success": true, "payments": []}));
}

#[tokio::test]
async fn payment_history_requires_student() {
    let (status, _) = call(
        app(Arc::new(MockBackend::new()), None),
        Method::GET,
        "/api/payments/history",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn save_payment_created_and_failure_is_500() {
    let backend = Arc::new(MockBackend::new().respond_json(
        Service::Student,
        "save_payment",
        json!({"success": true, "payment_id": "P-9"}),
    ));
    let body = json!({"studentId": "S-1", "amount": 75.5, "paymentIntentId": "pi_1"});

    let (status, json) = call(app(backend, None), Method::POST, "/api/payments/save", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["paymentId"], "P-9");

    let (status, json) = call(
        app(Arc::new(MockBackend::unavailable()), None),
        Method::POST,
        "/api/payments/save",
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn proxy_forwards_upstream_status() {
    let backend = Arc::new(MockBackend::new().respond(
        Service::Agent,
        "get_agent",
        404,
        r#"{"success":false,"error":"Agent not found"}"#,
    ));

    let (status, json) = call(
        app(backend, None),
        Method::GET,
        "/api/agents/profile?agentId=A-404",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Agent not found");
}

#[tokio::test]
async fn proxy_validates_before_forwarding() {
    let backend = Arc::new(MockBackend::new());
    let (status, json) = call(
        app(backend.clone(), None),
        Method::POST,
        "/api/agents/applications",
        Some(json!({"agentId": "A-1", "studentId": "S-1"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("courseId"));
    assert!(backend.requests().await.is_empty());
}

#[tokio::test]
async fn proxy_create_answers_201() {
    let backend = Arc::new(MockBackend::new().respond_json(
        Service::Users,
        "create_user",
        json!({"success": true, "user_id": 12}),
    ));

    let (status, json) = call(
        app(backend.clone(), None),
        Method::POST,
        "/api/users",
        Some(json!({"name": "Staff", "email": "staff@example.edu", "role": "admissions"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["user_id"], 12);
    assert_eq!(backend.requests().await[0].action, "create_user");
}

#[tokio::test]
async fn wrong_method_and_unknown_path() {
    let (status, json) = call(
        app(Arc::new(MockBackend::new()), None),
        Method::PATCH,
        "/api/users",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json["success"], false);

    let (status, _) = call(app(Arc::new(MockBackend::new()), None), Method::GET, "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stripe_config_returns_publishable_key() {
    let (status, json) = call(app(Arc::new(MockBackend::new()), None), Method::GET, "/api/stripe/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["publishableKey"], "pk_test_123");
}

fn signed_webhook(payload: &str) -> Request<Body> {
    let ts = Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(format!("{ts}.{payload}").as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/webhooks/stripe")
        .header("stripe-signature", format!("t={ts},v1={signature}"))
        .body(Body::from(payload.to_string()))
        .unwrap()
}

#[tokio::test]
async fn webhook_records_paid_invoice() {
    let backend = Arc::new(MockBackend::new().respond_json(
        Service::Student,
        "save_payment",
        json!({"success": true, "id": 5}),
    ));
    let payload = json!({
        "type": "invoice.paid",
        "data": {"object": {
            "id": "in_1", "amount_paid": 50000, "currency": "usd",
            "metadata": {"student_id": "S-1001"}
        }}
    })
    .to_string();

    let response = app(backend.clone(), None)
        .oneshot(signed_webhook(&payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let requests = backend.requests().await;
    assert_eq!(requests.len(), 1);
    let saved = requests[0].body.as_ref().unwrap();
    assert_eq!(saved["invoice_id"], "in_1");
    assert_eq!(saved["amount"], 500.0);
    assert_eq!(saved["status"], "paid");
}

#[tokio::test]
async fn webhook_rejects_bad_signature() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/webhooks/stripe")
        .header("stripe-signature", format!("t={},v1=deadbeef", Utc::now().timestamp()))
        .body(Body::from(r#"{"type":"invoice.paid"}"#))
        .unwrap();

    let response = app(Arc::new(MockBackend::new()), None)
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

async fn call_raw(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_raw(uri: &str, content_type: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder().method(Method::POST).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn malformed_bodies_get_json_400() {
    let billing = Arc::new(MockBilling::new());
    let cases = [
        post_raw(
            "/api/invoices",
            Some("application/json"),
            r#"{"studentId":"S-1","studentName":"Ada","studentEmail":"a@x.edu","items":"tuition"}"#,
        ),
        post_raw("/api/invoices", Some("application/json"), "{not json"),
        post_raw("/api/payments/intent", Some("application/json"), r#"{"amount":"lots"}"#),
        post_raw("/api/payments/save", None, r#"{"studentId":"S-1","amount":5,"invoiceId":"in_1"}"#),
    ];

    for request in cases {
        let uri = request.uri().to_string();
        let (status, json) = call_raw(
            app(Arc::new(MockBackend::new()), Some(billing.clone())),
            request,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json["success"], false, "{uri}");
        assert!(json["error"].is_string(), "{uri}");
    }

    assert!(billing.calls().await.is_empty());
}

#[tokio::test]
async fn proxy_invalid_json_body_is_400() {
    let backend = Arc::new(MockBackend::new());
    let (status, json) = call_raw(
        app(backend.clone(), None),
        post_raw("/api/users", Some("application/json"), "{oops"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(backend.requests().await.is_empty());
}

#[tokio::test]
async fn webhook_rejects_out_of_range_timestamp() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/webhooks/stripe")
        .header("stripe-signature", "t=-9223372036854775808,v1=00")
        .body(Body::from(r#"{"type":"invoice.paid"}"#))
        .unwrap();

    let (status, json) = call_raw(app(Arc::new(MockBackend::new()), None), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}
