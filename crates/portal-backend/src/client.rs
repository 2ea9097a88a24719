//! PHP Backend Client
//!
//! One outbound request per call, authenticated with the shared `X-API-KEY`
//! header. The PHP scripts select their operation from the `action` query
//! parameter.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, Result};

/// Header carrying the shared backend key
pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Which PHP API a request goes to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// `student_api.php`
    Student,
    /// `agent_api.php`
    Agent,
    /// `users_api.php` (admin and staff)
    Users,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Student => "student",
            Service::Agent => "agent",
            Service::Users => "users",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend configuration
#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// Full URL of `student_api.php`
    pub student_url: Option<String>,

    /// Full URL of `agent_api.php`
    pub agent_url: Option<String>,

    /// Full URL of `users_api.php`
    pub users_url: Option<String>,

    /// Shared key sent as `X-API-KEY`
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            student_url: None,
            agent_url: None,
            users_url: None,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let timeout_secs = std::env::var("BACKEND_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(30);

        Self {
            student_url: read("STUDENT_API_URL"),
            agent_url: read("AGENT_API_URL"),
            users_url: read("USERS_API_URL"),
            api_key: read("BACKEND_API_KEY"),
            timeout_secs,
        }
    }

    /// Base URL for a service, if configured
    pub fn url_for(&self, service: Service) -> Option<&str> {
        match service {
            Service::Student => self.student_url.as_deref(),
            Service::Agent => self.agent_url.as_deref(),
            Service::Users => self.users_url.as_deref(),
        }
    }

    /// Whether at least one service URL is set
    pub fn is_configured(&self) -> bool {
        [Service::Student, Service::Agent, Service::Users]
            .into_iter()
            .any(|s| self.url_for(s).is_some())
    }
}

/// A request to one PHP action
#[derive(Clone, Debug)]
pub struct BackendRequest {
    pub service: Service,
    pub method: Method,
    pub action: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl BackendRequest {
    pub fn get(service: Service, action: impl Into<String>) -> Self {
        Self {
            service,
            method: Method::GET,
            action: action.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(service: Service, action: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            service,
            method: Method::POST,
            action: action.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Raw backend response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendResponse {
    pub status: u16,
    pub body: String,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON
    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Turn a non-2xx response into an error
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let message = self
            .json()
            .ok()
            .and_then(|v| error_message(&v))
            .unwrap_or_else(|| self.body.chars().take(200).collect());
        Err(BackendError::Status {
            status: self.status,
            message,
        })
    }
}

/// Pull `error` or `message` out of a PHP JSON body
pub fn error_message(body: &serde_json::Value) -> Option<String> {
    ["error", "message"]
        .into_iter()
        .find_map(|key| body.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

/// Backend client trait (Strategy pattern)
#[async_trait]
pub trait Backend: Send + Sync {
    /// Perform one request and return the raw response, whatever its status
    async fn send(&self, request: BackendRequest) -> Result<BackendResponse>;

    /// Whether any service is reachable by configuration
    fn is_configured(&self) -> bool;
}

/// `Backend` over HTTP with reqwest
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    /// Create from configuration
    pub fn from_config(config: BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn send(&self, request: BackendRequest) -> Result<BackendResponse> {
        let url = self
            .config
            .url_for(request.service)
            .ok_or_else(|| BackendError::NotConfigured(format!("{} API URL", request.service)))?;

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .query(&[("action", request.action.as_str())])
            .query(&request.query);

        if let Some(key) = &self.config.api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(
            service = %request.service,
            action = %request.action,
            method = %request.method,
            "Calling backend"
        );

        let response = builder.send().await.inspect_err(|e| {
            tracing::warn!(service = %request.service, action = %request.action, error = %e, "Backend request failed");
        })?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        if !(200..300).contains(&status) {
            tracing::warn!(
                service = %request.service,
                action = %request.action,
                status,
                "Backend returned error status"
            );
        }

        Ok(BackendResponse { status, body })
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }
}
