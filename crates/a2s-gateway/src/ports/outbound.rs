//! Outbound ports for the callback bridge.

use crate::domain::error::RegistryError;
use crate::domain::target::TargetRecord;
use async_trait::async_trait;

/// Read/write access to registered targets.
///
/// The bridge only calls [`TargetRegistry::get`]; the rest is used by the
/// administrative routes.
pub trait TargetRegistry: Send + Sync {
    /// Copy of the record for `request_id`
    fn get(&self, request_id: &str) -> Option<TargetRecord>;

    /// Insert a new record; fails if the id is already taken
    fn insert(&self, record: TargetRecord) -> Result<TargetRecord, RegistryError>;

    /// All records, oldest first
    fn list(&self) -> Vec<TargetRecord>;

    /// Delete a record; returns true if it existed
    fn remove(&self, request_id: &str) -> bool;
}

/// Outcome of a dispatch the target accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReceipt {
    /// HTTP status returned by the target
    pub status: u16,
}

/// Dispatch failures. Logged by the bridge, never returned to its caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("request to {address} failed: {reason}")]
    Network { address: String, reason: String },
    #[error("{address} answered with status {status}")]
    Rejected { address: String, status: u16 },
}

/// Sends one forwarded request to a target and does not wait for the
/// callback.
#[async_trait]
pub trait OutboundDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        address: &str,
        payload: &serde_json::Value,
    ) -> Result<DispatchReceipt, DispatchError>;
}
