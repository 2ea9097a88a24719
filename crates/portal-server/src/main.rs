//! College portal HTTP gateway
//!
//! Axum server fronting Stripe and the portal's PHP APIs.

mod config;
mod error;
mod extract;
mod handlers;
mod proxy;
mod router;
mod state;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use portal_backend::{Backend, BackendConfig, HttpBackend};
use portal_payments::{BillingProvider, StripeClient, StripeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = ServerConfig::from_env();

    // PHP backend
    let backend_config = BackendConfig::from_env();
    if !backend_config.is_configured() {
        tracing::warn!("No backend URLs configured - proxy routes will fail");
        tracing::warn!("  Set STUDENT_API_URL, AGENT_API_URL and USERS_API_URL in .env");
    }
    if backend_config.api_key.is_none() {
        tracing::warn!("BACKEND_API_KEY not set - backend calls are unauthenticated");
    }
    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::from_config(backend_config)?);

    // Stripe
    let stripe_config = StripeConfig::from_env();
    let billing: Option<Arc<dyn BillingProvider>> = match StripeClient::from_config(&stripe_config) {
        Ok(client) => {
            tracing::info!("Stripe configured");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!("Stripe not configured - payments disabled: {}", e);
            None
        }
    };
    if stripe_config.webhook_secret.is_none() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set - webhooks disabled");
    }

    let state = AppState::new(backend, billing, &server, &stripe_config);
    let app = router::build(state);

    let listener = tokio::net::TcpListener::bind(&server.bind_addr).await?;

    tracing::info!("College portal gateway running on http://{}", server.bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                - Health check");
    tracing::info!("  GET  /api/stripe/config     - Publishable key");
    tracing::info!("  POST /api/payments/intent   - Create PaymentIntent");
    tracing::info!("  POST /api/invoices          - Create and email invoice");
    tracing::info!("  POST /api/payments/save     - Record completed payment");
    tracing::info!("  GET  /api/payments/history  - Student payment history");
    tracing::info!("  POST /webhooks/stripe       - Stripe webhook");
    tracing::info!("  {} proxied portal routes", portal_backend::ROUTES.len());

    axum::serve(listener, app).await?;

    Ok(())
}
