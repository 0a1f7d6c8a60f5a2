//! POST /interactive/ (§6): button click / feedback acknowledgement
//! contract. Same dispatch-only shape as [`crate::commands`] — interpreting
//! specific interaction payloads is out of scope (spec.md §1 Non-goals).

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use tracing::warn;

use crate::app::AppState;
use crate::signature::verify_signature;

pub async fn interactive_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let timestamp = headers
        .get("x-request-timestamp")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(unauthorized)?;
    let signature = headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(unauthorized)?;

    if !verify_signature(&state.config.gateway.signing_secret, timestamp, signature, &body) {
        warn!("interactive request failed signature verification");
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({"error": "invalid signature"})),
        ));
    }

    Ok(Json(json!({"ok": true})))
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::FORBIDDEN,
        Json(json!({"error": "invalid signature"})),
    )
}
