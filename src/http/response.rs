//! Response envelope normalization.
//!
//! The server wraps payloads three different ways:
//! - `{"message": ...}` for RPC methods and metadata endpoints
//! - `{"data": ...}` for resource collections
//! - no wrapper at all for the rest
//!
//! `message` wins over `data`: RPC payloads may carry an unrelated `data` key.

use serde_json::Value;

/// Extracts the payload from a response body.
///
/// Non-JSON bodies come back verbatim as a JSON string.
pub fn normalize(body: &str) -> Value {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return Value::String(body.to_string()),
    };

    match parsed {
        Value::Object(mut map) => {
            if let Some(message) = map.remove("message") {
                message
            } else if let Some(data) = map.remove("data") {
                data
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}

/// Best-effort human-readable detail for a failed response: the `message`
/// field of a JSON object body, else the raw body text.
pub fn error_detail(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("message") {
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        _ => body.to_string(),
    }
}
