//! Liveness and readiness handlers.
//!
//! - `GET /livez` - 200 if the process is alive (basic liveness check)
//! - `GET /readyz` - 200 if the server has an active signing key and has
//!   finished startup
//!
//! Both support content negotiation: `Accept: application/json` returns
//! `{"status": "..."}`, otherwise plain text.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use serde_json::json;

use crate::oauth2::AppState;
use crate::state::{is_signer_ready, SharedLifecycle};

pub async fn livez(Extension(lifecycle): Extension<SharedLifecycle>, headers: HeaderMap) -> Response {
    let (status, text) = if lifecycle.is_alive() {
        (StatusCode::OK, "live")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not live")
    };
    respond(status, text, &headers)
}

pub async fn readyz(
    Extension(lifecycle): Extension<SharedLifecycle>,
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let ready = lifecycle.is_ready() && is_signer_ready(&state).await;
    let (status, text) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    };
    respond(status, text, &headers)
}

fn respond(status: StatusCode, text: &str, headers: &HeaderMap) -> Response {
    let accept = headers
        .get("accept")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let json_wanted = accept.contains("application/json");

    let body = if json_wanted {
        json!({ "status": text }).to_string()
    } else {
        text.to_string()
    };

    Response::builder()
        .status(status)
        .header(
            "Content-Type",
            if json_wanted { "application/json" } else { "text/plain" },
        )
        .body(body.into())
        .unwrap()
}
