//! Feed generator DID document.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /.well-known/did.json`
///
/// Serves the generator's DID document. Answers 404 unless the configured
/// service DID actually ends with this host's name.
pub async fn did_document(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let config = &state.config;

    if !config.service_did.ends_with(&config.hostname) {
        return Err(ApiError::NotFound("did document not served here".to_string()));
    }

    Ok(Json(json!({
        "@context": ["https://www.w3.org/ns/did/v1"],
        "id": config.service_did,
        "service": [{
            "id": "#bsky_fg",
            "type": "BskyFeedGenerator",
            "serviceEndpoint": format!("https://{}", config.hostname)
        }]
    })))
}
