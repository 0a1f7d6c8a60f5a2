//! GET /health — liveness probe, following `skynet-gateway::http::health`'s
//! shape (server metadata, no auth required).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::app::AppState;

pub async fn health_handler(State(_state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "cortex-gateway",
    }))
}
