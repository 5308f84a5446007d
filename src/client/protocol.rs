//! Wire message shaping for the session protocol.
//!
//! Every message is one JSON text frame tagged by `type` and carrying an
//! ISO-8601 `timestamp`. Builders here produce outbound frames; inbound
//! frames are parsed tolerantly by the session reader and only the typed
//! payloads callers usually inspect get structs.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::domain::{Session, Snapshot};
use crate::error::{ArgusError, Result};

/// Fixed path segment appended to the base address before the session id
pub const SESSION_WS_PATH: &str = "/ws/session/";

/// ISO-8601 timestamp for outbound frames
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Derive the WebSocket endpoint from a configured base address.
///
/// The base scheme is substituted for its WebSocket counterpart (`https`
/// and `wss` stay secure, `http` and `ws` stay plain), any base path is
/// preserved, and the session path plus percent-encoded session id is
/// appended.
pub fn derive_endpoint(base_url: &str, session_id: &str) -> Result<String> {
    let base = Url::parse(base_url)
        .map_err(|e| ArgusError::Endpoint(format!("{}: {}", base_url, e)))?;

    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(ArgusError::Endpoint(format!(
                "unsupported scheme: {}",
                other
            )))
        }
    };

    let host = base
        .host_str()
        .ok_or_else(|| ArgusError::Endpoint(format!("missing host: {}", base_url)))?;

    let mut endpoint = format!("{}://{}", scheme, host);
    if let Some(port) = base.port() {
        endpoint.push(':');
        endpoint.push_str(&port.to_string());
    }
    endpoint.push_str(base.path().trim_end_matches('/'));
    endpoint.push_str(SESSION_WS_PATH);
    endpoint.push_str(&urlencoding::encode(session_id));

    Ok(endpoint)
}

/// Build a subscribe frame for one named server-push interest
pub fn build_subscribe(session_id: &str, subscription: &str) -> Value {
    json!({
        "type": "subscribe",
        "subscription": subscription,
        "session_id": session_id,
        "timestamp": now_timestamp(),
    })
}

/// Build a heartbeat frame
pub fn build_heartbeat(session_id: &str) -> Value {
    json!({
        "type": "heartbeat",
        "session_id": session_id,
        "timestamp": now_timestamp(),
    })
}

/// Build a fingerprint_data frame carrying one snapshot
pub fn build_fingerprint_data(session: &Session, snapshot: &Snapshot) -> Result<Value> {
    let data = serde_json::to_value(snapshot)?;
    Ok(json!({
        "type": "fingerprint_data",
        "session_id": session.session_id,
        "device_id": session.device_id,
        "data": data,
        "timestamp": now_timestamp(),
    }))
}

/// Build the control frame that asks the backend to expect periodic
/// device snapshots at the given cadence
pub fn build_start_device_streaming(session: &Session, interval_ms: u64) -> Value {
    json!({
        "type": "start_device_streaming",
        "session_id": session.session_id,
        "device_id": session.device_id,
        "interval_ms": interval_ms,
        "timestamp": now_timestamp(),
    })
}

/// Build the control frame that opens integrity monitoring for the session
pub fn build_start_session_monitoring(session: &Session) -> Value {
    json!({
        "type": "start_session_monitoring",
        "session_id": session.session_id,
        "device_id": session.device_id,
        "timestamp": now_timestamp(),
    })
}

/// Payload of an inbound violation_alert frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationAlert {
    pub violation_type: String,
    pub severity: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub detected_at: Option<String>,
    #[serde(default)]
    pub recommendation: Option<String>,
}

/// Payload of an inbound session_integrity frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIntegrity {
    pub integrity_score: f64,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_derive_endpoint_schemes() {
        assert_eq!(
            derive_endpoint("https://api.example.com", "s1").unwrap(),
            "wss://api.example.com/ws/session/s1"
        );
        assert_eq!(
            derive_endpoint("http://api.example.com", "s1").unwrap(),
            "ws://api.example.com/ws/session/s1"
        );
        assert_eq!(
            derive_endpoint("wss://api.example.com", "s1").unwrap(),
            "wss://api.example.com/ws/session/s1"
        );
        assert_eq!(
            derive_endpoint("ws://api.example.com", "s1").unwrap(),
            "ws://api.example.com/ws/session/s1"
        );
    }

    #[test]
    fn test_derive_endpoint_keeps_port_and_path() {
        assert_eq!(
            derive_endpoint("http://localhost:8080", "abc").unwrap(),
            "ws://localhost:8080/ws/session/abc"
        );
        assert_eq!(
            derive_endpoint("https://api.example.com/monitor/", "abc").unwrap(),
            "wss://api.example.com/monitor/ws/session/abc"
        );
    }

    #[test]
    fn test_derive_endpoint_encodes_session_id() {
        let endpoint = derive_endpoint("https://api.example.com", "user 1/2").unwrap();
        assert_eq!(endpoint, "wss://api.example.com/ws/session/user%201%2F2");
    }

    #[test]
    fn test_derive_endpoint_rejects_bad_input() {
        assert!(derive_endpoint("ftp://api.example.com", "s1").is_err());
        assert!(derive_endpoint("not a url", "s1").is_err());
    }

    #[test]
    fn test_subscribe_frame_shape() {
        let frame = build_subscribe("sess-9", "violation_alerts");
        assert_eq!(frame["type"], "subscribe");
        assert_eq!(frame["subscription"], "violation_alerts");
        assert_eq!(frame["session_id"], "sess-9");
        let ts = frame["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn test_fingerprint_data_frame_shape() {
        let session = Session::new("sess-9", "dev-1", "wss://x/ws/session/sess-9");
        let snapshot = Snapshot {
            collection_id: "c1".to_string(),
            collector_version: "1.0.0".to_string(),
            captured_at: Utc::now(),
            elapsed_ms: 5,
            categories: [("hardware".to_string(), json!({"cpus": 4}))]
                .into_iter()
                .collect(),
        };

        let frame = build_fingerprint_data(&session, &snapshot).unwrap();
        assert_eq!(frame["type"], "fingerprint_data");
        assert_eq!(frame["session_id"], "sess-9");
        assert_eq!(frame["device_id"], "dev-1");
        assert_eq!(frame["data"]["categories"]["hardware"]["cpus"], 4);
        assert_eq!(frame["data"]["collection_id"], "c1");
    }

    #[test]
    fn test_control_frame_shapes() {
        let session = Session::new("s", "d", "wss://x/ws/session/s");

        let streaming = build_start_device_streaming(&session, 15000);
        assert_eq!(streaming["type"], "start_device_streaming");
        assert_eq!(streaming["interval_ms"], 15000);

        let monitoring = build_start_session_monitoring(&session);
        assert_eq!(monitoring["type"], "start_session_monitoring");
        assert_eq!(monitoring["device_id"], "d");
    }

    #[test]
    fn test_violation_alert_parses_sparse_payload() {
        let payload = json!({
            "violation_type": "devtools_open",
            "severity": "high",
            "risk_score": 0.92,
        });

        let alert: ViolationAlert = serde_json::from_value(payload).unwrap();
        assert_eq!(alert.violation_type, "devtools_open");
        assert_eq!(alert.severity, "high");
        assert_eq!(alert.risk_score, Some(0.92));
        assert!(alert.description.is_none());
    }

    #[test]
    fn test_session_integrity_parses_enriched_payload() {
        let payload = json!({
            "type": "session_integrity",
            "integrity_score": 0.41,
            "status": "degraded",
            "session_id": "sess-9",
            "device_id": "dev-1",
        });

        let report: SessionIntegrity = serde_json::from_value(payload).unwrap();
        assert_eq!(report.integrity_score, 0.41);
        assert_eq!(report.status, "degraded");
    }
}
