//! Bridge error types and their HTTP-facing representation.
//!
//! Every error here is request-scoped: it fails the one request in flight
//! and never touches state owned by other requests.

use crate::domain::correlation::CallbackId;
use crate::domain::payload::PayloadError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Machine-readable error kinds returned to HTTP clients
pub mod kinds {
    pub const NO_SUCH_TARGET: &str = "NoSuchTarget";
    pub const CALLBACK_TIMEOUT: &str = "CallbackTimeout";
    pub const MALFORMED_CALLBACK: &str = "MalformedCallback";
    pub const DUPLICATE_ID: &str = "DuplicateID";
    pub const DISPATCH_CONSTRUCTION: &str = "DispatchConstruction";
    pub const NOT_FOUND: &str = "NotFound";
    pub const TARGET_EXISTS: &str = "TargetExists";
    pub const INVALID_TARGET: &str = "InvalidTarget";
    pub const TABLE_CORRUPTION: &str = "TableCorruption";
}

/// Failures of one bridge invocation
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Unknown request identifier
    #[error("no target registered for request id {0}")]
    NoSuchTarget(String),

    /// Deadline elapsed with no delivery
    #[error("no callback for {callback_id} within {}s", .deadline.as_secs())]
    CallbackTimeout {
        callback_id: CallbackId,
        deadline: Duration,
    },

    /// Delivered payload was not valid JSON
    #[error("callback {callback_id} delivered malformed JSON: {source}")]
    MalformedCallback {
        callback_id: CallbackId,
        #[source]
        source: serde_json::Error,
    },

    /// Correlation table already held this id
    #[error("callback id {0} is already pending")]
    DuplicateId(CallbackId),

    /// Outbound payload could not be built
    #[error("could not build outbound request: {0}")]
    DispatchConstruction(#[from] PayloadError),

    /// Pending entry vanished without a delivery or a deadline
    #[error("pending wait for {0} was removed without a delivery")]
    Abandoned(CallbackId),
}

impl BridgeError {
    /// Error kind reported to clients
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoSuchTarget(_) => kinds::NO_SUCH_TARGET,
            Self::CallbackTimeout { .. } => kinds::CALLBACK_TIMEOUT,
            Self::MalformedCallback { .. } => kinds::MALFORMED_CALLBACK,
            Self::DuplicateId(_) => kinds::DUPLICATE_ID,
            Self::DispatchConstruction(_) => kinds::DISPATCH_CONSTRUCTION,
            Self::Abandoned(_) => kinds::TABLE_CORRUPTION,
        }
    }
}

/// Failures of the inbound callback receiver
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReceiveError {
    /// Never registered, already fulfilled, or already timed out
    #[error("no pending wait for callback id {0}")]
    NotFound(String),
}

/// Target registry failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Caller-assigned request id is taken
    #[error("target {0} already exists")]
    TargetExists(String),

    /// Descriptor failed validation
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Lookup of an unknown id
    #[error("no target registered for request id {0}")]
    NotFound(String),
}

/// HTTP-facing error: a status code plus a structured body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code
    pub status: u16,
    /// Error kind, one of [`kinds`]
    pub kind: &'static str,
    /// Human-readable detail
    pub detail: String,
}

impl ApiError {
    pub fn new(status: u16, kind: &'static str, detail: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            detail: detail.into(),
        }
    }

    pub fn not_found(kind: &'static str, detail: impl Into<String>) -> Self {
        Self::new(404, kind, detail)
    }

    /// JSON body sent to the client
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind.to_string(),
            detail: self.detail.clone(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}] {}", self.status, self.kind, self.detail)
    }
}

impl std::error::Error for ApiError {}

/// Wire form of [`ApiError`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub detail: String,
}

impl From<BridgeError> for ApiError {
    fn from(e: BridgeError) -> Self {
        let status = match e {
            BridgeError::NoSuchTarget(_) => 404,
            BridgeError::CallbackTimeout { .. } => 504,
            BridgeError::MalformedCallback { .. }
            | BridgeError::DuplicateId(_)
            | BridgeError::DispatchConstruction(_)
            | BridgeError::Abandoned(_) => 500,
        };
        ApiError::new(status, e.kind(), e.to_string())
    }
}

impl From<ReceiveError> for ApiError {
    fn from(e: ReceiveError) -> Self {
        ApiError::not_found(kinds::NOT_FOUND, e.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::TargetExists(_) => ApiError::new(409, kinds::TARGET_EXISTS, e.to_string()),
            RegistryError::InvalidTarget(_) => {
                ApiError::new(422, kinds::INVALID_TARGET, e.to_string())
            }
            RegistryError::NotFound(_) => ApiError::not_found(kinds::NO_SUCH_TARGET, e.to_string()),
        }
    }
}

/// Result type for handler-level operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Service-level errors (startup and serving, not per request)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// HTTP client could not be built
    #[error("http client error: {0}")]
    Client(String),

    /// Listener stopped with an error
    #[error("server error: {0}")]
    Serve(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let id = CallbackId::new();
        let cases = [
            (BridgeError::NoSuchTarget("x".into()), 404),
            (
                BridgeError::CallbackTimeout {
                    callback_id: id,
                    deadline: Duration::from_secs(1),
                },
                504,
            ),
            (BridgeError::DuplicateId(id), 500),
            (BridgeError::Abandoned(id), 500),
            (
                BridgeError::DispatchConstruction(PayloadError::NotAnObject("array")),
                500,
            ),
        ];

        for (err, status) in cases {
            let kind = err.kind();
            let api: ApiError = err.into();
            assert_eq!(api.status, status);
            assert_eq!(api.kind, kind);
        }
    }

    #[test]
    fn test_malformed_callback_is_server_error() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let api: ApiError = BridgeError::MalformedCallback {
            callback_id: CallbackId::new(),
            source,
        }
        .into();
        assert_eq!(api.status, 500);
        assert_eq!(api.kind, kinds::MALFORMED_CALLBACK);
    }

    #[test]
    fn test_timeout_detail_mentions_deadline() {
        let err = BridgeError::CallbackTimeout {
            callback_id: CallbackId::new(),
            deadline: Duration::from_secs(7),
        };
        assert!(err.to_string().contains("7s"));
    }

    #[test]
    fn test_error_body_serialization() {
        let err = ApiError::from(ReceiveError::NotFound("abc".into()));
        let json = serde_json::to_value(err.body()).unwrap();
        assert_eq!(json["kind"], "NotFound");
        assert!(json["detail"].as_str().unwrap().contains("abc"));
    }

    #[test]
    fn test_registry_conflict_maps_to_409() {
        let err: ApiError = RegistryError::TargetExists("t1".into()).into();
        assert_eq!(err.status, 409);
    }
}
