//! Proxy Route Catalog
//!
//! Every CRUD endpoint of the student, agent and admin portals is a thin
//! pass-through to one PHP action. The table below is the whole list; the
//! server mounts one handler per entry.

use std::collections::HashMap;

use reqwest::Method;
use serde_json::{Value, json};

use crate::client::{Backend, BackendRequest, BackendResponse, Service};
use crate::error::Result;

/// How inbound data reaches the backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestMode {
    /// Query parameters are forwarded
    Query,
    /// The JSON body is forwarded
    Json,
}

/// One proxied endpoint
#[derive(Debug)]
pub struct ProxyRoute {
    pub path: &'static str,
    pub method: Method,
    pub service: Service,
    pub action: &'static str,
    pub required: &'static [&'static str],
    pub mode: RequestMode,
    /// Answer 201 instead of 200 on success
    pub creates: bool,
}

const fn query(
    path: &'static str,
    method: Method,
    service: Service,
    action: &'static str,
    required: &'static [&'static str],
) -> ProxyRoute {
    ProxyRoute {
        path,
        method,
        service,
        action,
        required,
        mode: RequestMode::Query,
        creates: false,
    }
}

const fn json_body(
    path: &'static str,
    method: Method,
    service: Service,
    action: &'static str,
    required: &'static [&'static str],
    creates: bool,
) -> ProxyRoute {
    ProxyRoute {
        path,
        method,
        service,
        action,
        required,
        mode: RequestMode::Json,
        creates,
    }
}

/// All proxied endpoints
pub static ROUTES: &[ProxyRoute] = &[
    // Student portal
    query("/api/students/profile", Method::GET, Service::Student, "get_profile", &["studentId"]),
    json_body("/api/students/profile", Method::PUT, Service::Student, "update_profile", &["studentId"], false),
    query("/api/students/applications", Method::GET, Service::Student, "get_applications", &["studentId"]),
    json_body(
        "/api/students/applications",
        Method::POST,
        Service::Student,
        "submit_application",
        &["studentId", "courseId"],
        true,
    ),
    query("/api/students/documents", Method::GET, Service::Student, "get_documents", &["studentId"]),
    // Agent portal
    query("/api/agents", Method::GET, Service::Agent, "list_agents", &[]),
    json_body("/api/agents", Method::POST, Service::Agent, "create_agent", &["name", "email"], true),
    json_body("/api/agents", Method::PUT, Service::Agent, "update_agent", &["agentId"], false),
    query("/api/agents/profile", Method::GET, Service::Agent, "get_agent", &["agentId"]),
    query("/api/agents/students", Method::GET, Service::Agent, "get_agent_students", &["agentId"]),
    query("/api/agents/commissions", Method::GET, Service::Agent, "get_commissions", &["agentId"]),
    json_body(
        "/api/agents/applications",
        Method::POST,
        Service::Agent,
        "submit_application",
        &["agentId", "studentId", "courseId"],
        true,
    ),
    // Admin and staff
    query("/api/users", Method::GET, Service::Users, "list_users", &[]),
    json_body("/api/users", Method::POST, Service::Users, "create_user", &["name", "email", "role"], true),
    json_body("/api/users", Method::PUT, Service::Users, "update_user", &["userId"], false),
    query("/api/users", Method::DELETE, Service::Users, "delete_user", &["userId"]),
    query("/api/applications", Method::GET, Service::Users, "list_applications", &[]),
    json_body(
        "/api/applications/status",
        Method::PUT,
        Service::Users,
        "update_application_status",
        &["applicationId", "status"],
        false,
    ),
    query("/api/permissions", Method::GET, Service::Users, "get_permissions", &["userId"]),
    json_body(
        "/api/permissions",
        Method::PUT,
        Service::Users,
        "update_permissions",
        &["userId", "permissions"],
        false,
    ),
    query("/api/staff-activity", Method::GET, Service::Users, "get_staff_activity", &[]),
    json_body(
        "/api/staff-activity",
        Method::POST,
        Service::Users,
        "log_staff_activity",
        &["userId", "activity"],
        true,
    ),
];

/// Status and JSON body to hand back to the browser
#[derive(Clone, Debug, PartialEq)]
pub struct ProxyReply {
    pub status: u16,
    pub body: Value,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

impl ProxyRoute {
    /// Required fields absent from the inbound request
    pub fn missing_fields(
        &self,
        query: &HashMap<String, String>,
        body: Option<&Value>,
    ) -> Vec<&'static str> {
        self.required
            .iter()
            .copied()
            .filter(|field| match self.mode {
                RequestMode::Query => query.get(*field).is_none_or(|v| v.trim().is_empty()),
                RequestMode::Json => body.and_then(|b| b.get(*field)).is_none_or(is_blank),
            })
            .collect()
    }

    /// Build the outbound request for this route
    pub fn request(&self, query: &HashMap<String, String>, body: Option<Value>) -> BackendRequest {
        let mut pairs: Vec<(String, String)> =
            query.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        pairs.sort();

        BackendRequest {
            service: self.service,
            method: self.method.clone(),
            action: self.action.to_string(),
            query: pairs,
            body: match self.mode {
                RequestMode::Json => Some(body.unwrap_or_else(|| json!({}))),
                RequestMode::Query => None,
            },
        }
    }

    /// Forward to the backend and shape the reply
    pub async fn forward(
        &self,
        backend: &dyn Backend,
        query: &HashMap<String, String>,
        body: Option<Value>,
    ) -> Result<ProxyReply> {
        let response = backend.send(self.request(query, body)).await?;
        Ok(self.relay(response))
    }

    /// Relay a backend response
    ///
    /// Non-2xx statuses pass through unchanged. JSON bodies pass through
    /// verbatim; a 2xx body that is not JSON becomes a 500.
    pub fn relay(&self, response: BackendResponse) -> ProxyReply {
        let parsed = response.json().ok();

        if !response.is_success() {
            let body = parsed.filter(Value::is_object).unwrap_or_else(|| {
                let text = response.body.trim();
                let error = if text.is_empty() || text.starts_with('<') {
                    format!("Backend request failed with status {}", response.status)
                } else {
                    text.chars().take(200).collect()
                };
                json!({"success": false, "error": error})
            });
            return ProxyReply {
                status: response.status,
                body,
            };
        }

        match parsed {
            Some(body) => ProxyReply {
                status: if self.creates { 201 } else { 200 },
                body,
            },
            None => {
                tracing::error!(action = self.action, service = %self.service, "Backend returned non-JSON body");
                ProxyReply {
                    status: 500,
                    body: json!({"success": false, "error": "Invalid response from backend"}),
                }
            }
        }
    }
}
