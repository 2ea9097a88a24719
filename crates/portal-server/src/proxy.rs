//! CRUD Proxy Routes
//!
//! Mounts one handler per entry of the backend route catalog.

use std::collections::{BTreeMap, HashMap};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{MethodFilter, MethodRouter},
};
use portal_backend::{ProxyRoute, ROUTES, RequestMode};
use serde_json::Value;

use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::handlers::method_not_allowed;
use crate::state::AppState;

/// Forward one request along `route`
async fn proxy(
    state: AppState,
    route: &'static ProxyRoute,
    query: HashMap<String, String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let body = match route.mode {
        RequestMode::Json if body.is_empty() => None,
        RequestMode::Json => Some(
            serde_json::from_slice::<Value>(&body)
                .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))?,
        ),
        RequestMode::Query => None,
    };

    let missing = route.missing_fields(&query, body.as_ref());
    if !missing.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Missing required field(s): {}",
            missing.join(", ")
        )));
    }

    let reply = route
        .forward(state.backend.as_ref(), &query, body)
        .await
        .map_err(|e| {
            tracing::error!(action = route.action, service = %route.service, error = %e, "Proxy request failed");
            ApiError::Upstream(format!("Failed to reach {} service", route.service))
        })?;

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);

    Ok((status, Json(reply.body)).into_response())
}

/// Router with every catalog route mounted
pub fn routes() -> Router<AppState> {
    let mut by_path: BTreeMap<&'static str, MethodRouter<AppState>> = BTreeMap::new();

    for route in ROUTES {
        let Ok(filter) = MethodFilter::try_from(route.method.clone()) else {
            tracing::warn!(method = %route.method, path = route.path, "Skipping route with unsupported method");
            continue;
        };

        let handler = move |State(state): State<AppState>,
                            ApiQuery(query): ApiQuery<HashMap<String, String>>,
                            body: Bytes| async move {
            proxy(state, route, query, body).await
        };

        let method_router = by_path.remove(route.path).unwrap_or_default();
        by_path.insert(route.path, method_router.on(filter, handler));
    }

    by_path
        .into_iter()
        .fold(Router::new(), |router, (path, method_router)| {
            router.route(path, method_router.fallback(method_not_allowed))
        })
}
