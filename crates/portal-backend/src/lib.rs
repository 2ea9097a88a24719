//! # portal-backend
//!
//! Client for the PHP APIs that own the portal's data.
//!
//! ## Services
//!
//! - **Student** (`student_api.php`): profiles, applications, documents, payments
//! - **Agent** (`agent_api.php`): agents, their students, commissions
//! - **Users** (`users_api.php`): staff accounts, permissions, application review
//!
//! Every call is a single request carrying the shared `X-API-KEY` header and
//! an `action` query parameter. No retries.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use portal_backend::{BackendConfig, HttpBackend, PaymentsApi};
//!
//! let backend = Arc::new(HttpBackend::from_config(BackendConfig::from_env())?);
//! let payments = PaymentsApi::new(backend);
//! let history = payments.payment_history("S-1001").await?;
//! ```

pub mod client;
pub mod error;
mod mock;
pub mod payments;
pub mod routes;

pub use client::{Backend, BackendConfig, BackendRequest, BackendResponse, HttpBackend, Service};
pub use error::{BackendError, Result};
pub use mock::MockBackend;
pub use payments::{PaymentRecord, PaymentsApi, SavePaymentRequest};
pub use routes::{ProxyReply, ProxyRoute, ROUTES, RequestMode};
