//! POST /events/ (§4.1): the inbound event envelope. Signature verification,
//! `url_verification` challenge echo, `event_callback` classification, the
//! self-filter, and dedup all happen here before anything is handed to the
//! orchestrator — mirroring `skynet-gateway::http::webhooks::webhook_handler`'s
//! "authenticate, parse, classify, forward" shape, generalized from a single
//! webhook source to this platform's one fixed event contract.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use cortex_pipeline::orchestrator::{ChannelType, InboundEvent};

use crate::app::AppState;
use crate::dedup::fingerprint;
use crate::signature::verify_signature;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    challenge: Option<String>,
    event: Option<InnerEvent>,
}

#[derive(Debug, Deserialize)]
struct InnerEvent {
    #[serde(rename = "type")]
    kind: String,
    subtype: Option<String>,
    user: Option<String>,
    channel: Option<String>,
    channel_type: Option<String>,
    text: Option<String>,
    ts: Option<String>,
    client_msg_id: Option<String>,
    bot_id: Option<String>,
    app_id: Option<String>,
    event_id: Option<String>,
}

/// POST /events/
///
/// Verifies the request signature, classifies the envelope, and — for a
/// genuine, non-duplicate user message — spawns the orchestrator pipeline
/// in the background before acknowledging. The ack is returned immediately
/// so the platform's short delivery deadline (§4.1: "~3s") is never at the
/// mercy of model latency.
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let timestamp = header_str(&headers, "x-request-timestamp").ok_or_else(|| {
        warn!("events request missing timestamp header");
        unauthorized()
    })?;
    let signature = header_str(&headers, "x-signature").ok_or_else(|| {
        warn!("events request missing signature header");
        unauthorized()
    })?;

    if !verify_signature(&state.config.gateway.signing_secret, timestamp, signature, &body) {
        warn!("events request failed signature verification");
        return Err(unauthorized());
    }

    let envelope: Envelope = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "malformed events body");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "malformed body"})),
        )
    })?;

    if envelope.kind == "url_verification" {
        let challenge = envelope.challenge.unwrap_or_default();
        return Ok(Json(json!({"challenge": challenge})));
    }

    if envelope.kind != "event_callback" {
        return Ok(Json(json!({"ok": true})));
    }

    let Some(inner) = envelope.event else {
        return Ok(Json(json!({"ok": true})));
    };

    if inner.kind != "message" {
        return Ok(Json(json!({"ok": true})));
    }
    if !matches!(inner.subtype.as_deref(), None | Some("bot_message")) {
        return Ok(Json(json!({"ok": true})));
    }

    // Self-filter: drop our own posts reflected back to us.
    if let (Some(bot_id), Some(app_id)) = (&inner.bot_id, &inner.app_id) {
        if !bot_id.is_empty() && app_id == &state.config.gateway.app_id {
            return Ok(Json(json!({"ok": true})));
        }
    }

    let (Some(user), Some(channel), Some(text)) = (inner.user.clone(), inner.channel.clone(), inner.text.clone())
    else {
        return Ok(Json(json!({"ok": true})));
    };

    let fp = fingerprint(
        inner.event_id.as_deref().unwrap_or_default(),
        inner.ts.as_deref().unwrap_or_default(),
        inner.client_msg_id.as_deref().unwrap_or_default(),
        &user,
        &text,
    );
    if state.dedup.seen_before(&fp) {
        info!(fingerprint = %fp, "duplicate event, acknowledging without reprocessing");
        return Ok(Json(json!({"ok": true})));
    }

    let channel_type = match inner.channel_type.as_deref() {
        Some("im") => ChannelType::Direct,
        _ => ChannelType::Channel,
    };

    let event = InboundEvent {
        user,
        channel,
        channel_type,
        text,
    };

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        orchestrator.handle(event).await;
    });

    Ok(Json(json!({"ok": true})))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::FORBIDDEN,
        Json(json!({"error": "invalid signature"})),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_deserializes_url_verification() {
        let raw = r#"{"type":"url_verification","challenge":"abc123"}"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.kind, "url_verification");
        assert_eq!(envelope.challenge.as_deref(), Some("abc123"));
    }

    #[test]
    fn envelope_deserializes_event_callback_message() {
        let raw = r#"{
            "type": "event_callback",
            "event": {
                "type": "message",
                "user": "U1",
                "channel": "C1",
                "channel_type": "channel",
                "text": "hello",
                "ts": "100.1",
                "client_msg_id": "c1",
                "event_id": "Ev1"
            }
        }"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.kind, "event_callback");
        let inner = envelope.event.unwrap();
        assert_eq!(inner.kind, "message");
        assert_eq!(inner.text.as_deref(), Some("hello"));
    }
}
