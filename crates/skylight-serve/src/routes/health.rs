//! Health check endpoint.

use axum::Json;
use serde_json::{json, Value};

/// `GET /health`
///
/// Liveness check; does not touch the store.
pub async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
