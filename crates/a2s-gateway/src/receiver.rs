//! Inbound callback receiver.

use crate::adapters::pending::{CorrelationTable, DeliverySource};
use crate::domain::correlation::CallbackId;
use crate::domain::error::ReceiveError;
use crate::middleware::BridgeMetrics;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info};

/// Hands webhook bodies to the bridge waiting on them.
///
/// Never blocks: a callback either finds its pending wait right now or is
/// rejected.
pub struct CallbackReceiver {
    table: Arc<CorrelationTable>,
    metrics: Arc<BridgeMetrics>,
}

impl CallbackReceiver {
    pub fn new(table: Arc<CorrelationTable>, metrics: Arc<BridgeMetrics>) -> Self {
        Self { table, metrics }
    }

    /// Deliver `body` to the wait registered under `callback_id`.
    ///
    /// On success the raw body is returned as the acknowledgement. Unknown,
    /// unparseable, already fulfilled or expired ids are all `NotFound`.
    pub fn on_callback(
        &self,
        callback_id: &str,
        body: Bytes,
        source: DeliverySource,
    ) -> Result<Bytes, ReceiveError> {
        let Ok(id) = CallbackId::parse(callback_id.trim()) else {
            self.metrics.record_callback(false);
            debug!(callback_id = callback_id, "Callback id is not a UUID");
            return Err(ReceiveError::NotFound(callback_id.to_string()));
        };

        let remote = source.remote_addr;
        if !self.table.deliver(&id, body.clone(), source) {
            self.metrics.record_callback(false);
            debug!(callback_id = %id, "Callback matched no pending wait");
            return Err(ReceiveError::NotFound(callback_id.to_string()));
        }

        self.metrics.record_callback(true);
        info!(
            callback_id = %id,
            remote_addr = ?remote,
            bytes = body.len(),
            "Callback accepted"
        );
        Ok(body)
    }
}
