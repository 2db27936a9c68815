//! Outbound payload construction.
//!
//! The caller's body is forwarded untouched except for one injected object
//! under [`CORRELATION_KEY`] that tells the external system where to call
//! back.

use crate::domain::correlation::CallbackId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level key of the injected correlation block
pub const CORRELATION_KEY: &str = "A2S";

/// Correlation metadata injected into every forwarded payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationBlock {
    pub callback_id: CallbackId,
    /// Fully qualified callback URL; only set for targets that call back
    /// through this proxy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_address: Option<String>,
    /// Out-of-band notification address registered with the target
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_address: Option<String>,
}

/// Reasons the outbound payload could not be built
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("request body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("request body must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Parse the caller's body and deep-merge the correlation block into it.
pub fn build_outbound(body: &[u8], block: &CorrelationBlock) -> Result<Value, PayloadError> {
    let mut payload: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Map::new())
    } else {
        serde_json::from_slice(body)?
    };

    if !payload.is_object() {
        return Err(PayloadError::NotAnObject(json_kind(&payload)));
    }

    let mut injected = Map::new();
    injected.insert(CORRELATION_KEY.to_string(), serde_json::to_value(block)?);
    deep_merge(&mut payload, Value::Object(injected));

    Ok(payload)
}

/// Recursively merge `patch` into `target`.
///
/// Objects merge key by key; any other value in `patch` replaces what is in
/// `target`.
pub fn deep_merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
