//! Route Table

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    create_invoice, create_payment_intent, health_check, method_not_allowed, not_found,
    payment_history, save_payment, stripe_config, stripe_webhook,
};
use crate::proxy;
use crate::state::AppState;

/// Build the full application router
pub fn build(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & config
        .route("/health", get(health_check))
        .route("/api/stripe/config", get(stripe_config).fallback(method_not_allowed))

        // Payments
        .route("/api/payments/intent", post(create_payment_intent).fallback(method_not_allowed))
        .route("/api/payments/save", post(save_payment).fallback(method_not_allowed))
        .route("/api/payments/history", get(payment_history).fallback(method_not_allowed))
        .route("/api/invoices", post(create_invoice).fallback(method_not_allowed))
        .route("/webhooks/stripe", post(stripe_webhook).fallback(method_not_allowed))

        // Student, agent and admin CRUD
        .merge(proxy::routes())

        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
