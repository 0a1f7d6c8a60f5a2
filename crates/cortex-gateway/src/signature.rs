//! Inbound signature verification (§4.1, §6): HMAC-SHA256 over
//! `v0:<timestamp>:<raw_body>`, compared in constant time via
//! `Mac::verify_slice`, exactly mirroring
//! `skynet-gateway::http::webhooks::verify_hmac_sha256`'s hex-decode-then-MAC
//! shape — generalized from GitHub's `sha256=<hex>` header to this
//! platform's `v0=<hex>` scheme and timestamp-window check.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use cortex_core::config::SIGNATURE_WINDOW_SECS;

type HmacSha256 = Hmac<Sha256>;

/// Verify `signature_header` (`v0=<hex>`) against `secret`, `timestamp`, and
/// `raw_body`. Rejects a timestamp older than [`SIGNATURE_WINDOW_SECS`]
/// (§4.1: "older than 5 minutes"); a forward-skewed timestamp is not
/// rejected — that is a platform clock issue, not an attack this gateway is
/// positioned to police (Open Question, resolved in DESIGN.md).
pub fn verify_signature(secret: &str, timestamp: &str, signature_header: &str, raw_body: &[u8]) -> bool {
    let Ok(ts) = timestamp.parse::<i64>() else {
        return false;
    };
    if Utc::now().timestamp() - ts > SIGNATURE_WINDOW_SECS {
        return false;
    }

    let Some(sig_hex) = signature_header.strip_prefix("v0=") else {
        return false;
    };
    let Ok(expected) = hex::decode(sig_hex) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(raw_body);

    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(b"v0:");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        format!("v0={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_a_freshly_signed_request() {
        let ts = Utc::now().timestamp().to_string();
        let body = br#"{"type":"event_callback"}"#;
        let sig = sign("s3cr3t", &ts, body);
        assert!(verify_signature("s3cr3t", &ts, &sig, body));
    }

    #[test]
    fn rejects_a_mismatched_signature() {
        let ts = Utc::now().timestamp().to_string();
        let body = b"payload";
        let sig = sign("s3cr3t", &ts, body);
        assert!(!verify_signature("different-secret", &ts, &sig, body));
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let ts = (Utc::now().timestamp() - SIGNATURE_WINDOW_SECS - 60).to_string();
        let body = b"payload";
        let sig = sign("s3cr3t", &ts, body);
        assert!(!verify_signature("s3cr3t", &ts, &sig, body));
    }

    #[test]
    fn rejects_malformed_hex() {
        let ts = Utc::now().timestamp().to_string();
        assert!(!verify_signature("s3cr3t", &ts, "v0=not-hex", b"payload"));
    }
}
