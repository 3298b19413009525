// src/verbs/responses.rs
// Uniform verb response envelope

use crate::error::MnemoError;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// Machine-readable error payload; never a stack trace
#[derive(Debug, Clone, Serialize)]
pub struct VerbError {
    pub code: String,
    pub message: String,
}

/// Every verb returns `{success, verb, …payload, timestamp}` or
/// `{success:false, verb, error, timestamp}`
#[derive(Debug, Clone, Serialize)]
pub struct VerbResponse {
    pub success: bool,
    pub verb: String,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<VerbError>,
    /// ISO-8601 UTC
    pub timestamp: String,
    #[serde(skip)]
    pub http_status: u16,
}

impl VerbResponse {
    pub fn ok(verb: &str, payload: serde_json::Value) -> Self {
        let payload = match payload {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("result".to_string(), other);
                map
            }
        };
        Self {
            success: true,
            verb: verb.to_string(),
            payload,
            error: None,
            timestamp: now_iso(),
            http_status: 200,
        }
    }

    pub fn err(verb: &str, error: &MnemoError) -> Self {
        Self {
            success: false,
            verb: verb.to_string(),
            payload: serde_json::Map::new(),
            error: Some(VerbError {
                code: error.code().to_string(),
                message: error.to_string(),
            }),
            timestamp: now_iso(),
            http_status: error.http_status(),
        }
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_envelope_flattens_payload() {
        let resp = VerbResponse::ok("tell", json!({"stored": true, "id": "x"}));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["verb"], json!("tell"));
        assert_eq!(value["stored"], json!(true));
        assert!(value.get("error").is_none());
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_err_envelope_carries_code_and_status() {
        let resp = VerbResponse::err("ask", &MnemoError::InvalidParameter("empty".to_string()));
        assert!(!resp.success);
        assert_eq!(resp.http_status, 400);
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["error"]["code"], json!("INVALID_PARAMETER"));
    }

    #[test]
    fn test_non_object_payload_wrapped() {
        let resp = VerbResponse::ok("inspect", json!([1, 2]));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["result"], json!([1, 2]));
    }
}
