//! Mock Backend
//!
//! Canned responses keyed by service and action, for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::client::{Backend, BackendRequest, BackendResponse, Service};
use crate::error::{BackendError, Result};

/// Mock backend with canned responses
#[derive(Default)]
pub struct MockBackend {
    responses: HashMap<(Service, String), BackendResponse>,
    requests: Mutex<Vec<BackendRequest>>,
    unavailable: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `action` on `service` with a status and raw body
    pub fn respond(mut self, service: Service, action: &str, status: u16, body: &str) -> Self {
        self.responses.insert(
            (service, action.to_string()),
            BackendResponse {
                status,
                body: body.to_string(),
            },
        );
        self
    }

    /// Answer `action` on `service` with JSON and a 200
    pub fn respond_json(self, service: Service, action: &str, body: serde_json::Value) -> Self {
        self.respond(service, action, 200, &body.to_string())
    }

    /// Fail every request as if the backend were down
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Requests received so far
    pub async fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn send(&self, request: BackendRequest) -> Result<BackendResponse> {
        let key = (request.service, request.action.clone());
        self.requests.lock().await.push(request);

        if self.unavailable {
            return Err(BackendError::Unavailable("connection refused".into()));
        }

        Ok(self.responses.get(&key).cloned().unwrap_or(BackendResponse {
            status: 404,
            body: r#"{"success":false,"error":"Unknown action"}"#.into(),
        }))
    }

    fn is_configured(&self) -> bool {
        true
    }
}
