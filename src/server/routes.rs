//! HTTP routes for signature verification

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::verify::{verify_request, VerifyRequest};
use super::ServerConfig;

const SERVICE: &str = "monkeymask-bridge";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self { config: Arc::new(config) }
    }
}

pub fn create_router(config: ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/verify-signature", get(verify_usage).post(verify_signature))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(config))
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok", "service": SERVICE}))
}

async fn verify_usage() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": SERVICE,
        "endpoint": "POST /verify-signature",
        "body": {"message": "string", "signature": "hex", "publicKey": "ban_ address or hex", "origin": "optional"},
    }))
}

/// Body is taken as raw bytes so a missing or non-JSON body still gets the
/// `{error, valid: false}` shape instead of an extractor rejection.
async fn verify_signature(State(s): State<AppState>, headers: HeaderMap, body: axum::body::Bytes) -> (StatusCode, Json<Value>) {
    let value: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let request = VerifyRequest::from_value(&value);

    let header_origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    let origin = request
        .origin
        .as_deref()
        .filter(|o| !o.trim().is_empty())
        .or(header_origin.filter(|o| !o.trim().is_empty()))
        .unwrap_or(&s.config.default_origin)
        .to_string();

    match verify_request(&request, &origin) {
        Ok(response) => match serde_json::to_value(&response) {
            Ok(body) => (StatusCode::OK, Json(body)),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode verification response");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "Internal server error", "valid": false})))
            }
        },
        Err(e) => {
            tracing::debug!(error = %e, "verification request rejected");
            (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string(), "valid": false})))
        }
    }
}
