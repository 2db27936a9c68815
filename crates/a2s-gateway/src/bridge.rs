//! Callback bridge: request → dispatch → suspend → resume → cleanup.
//!
//! One call to [`CallbackBridge::bridge`] serves one caller. The pending wait
//! is registered before the outbound request leaves, so a target that calls
//! back faster than the dispatch returns still finds it.

use crate::adapters::pending::{CorrelationTable, DeliverySource, WaitOutcome};
use crate::domain::config::BridgeConfig;
use crate::domain::correlation::CallbackId;
use crate::domain::error::BridgeError;
use crate::domain::payload::{build_outbound, CorrelationBlock};
use crate::middleware::BridgeMetrics;
use crate::ports::{OutboundDispatcher, TargetRegistry};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What a bridge invocation produced
#[derive(Debug)]
pub enum BridgeOutcome {
    /// Target has no forwarding address; the request body, unmodified
    Echo(Bytes),
    /// Callback arrived before the deadline
    Fulfilled {
        /// Parsed callback body
        payload: Value,
        /// Who delivered it
        source: DeliverySource,
        /// Time from registration to delivery
        elapsed: Duration,
    },
}

/// Orchestrates bridged requests.
///
/// Cheap to share: everything it holds is behind an `Arc` or immutable.
pub struct CallbackBridge {
    registry: Arc<dyn TargetRegistry>,
    table: Arc<CorrelationTable>,
    dispatcher: Arc<dyn OutboundDispatcher>,
    config: BridgeConfig,
    metrics: Arc<BridgeMetrics>,
}

impl CallbackBridge {
    pub fn new(
        registry: Arc<dyn TargetRegistry>,
        table: Arc<CorrelationTable>,
        dispatcher: Arc<dyn OutboundDispatcher>,
        config: BridgeConfig,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            registry,
            table,
            dispatcher,
            config,
            metrics,
        }
    }

    /// Bridge one request against the target registered as `request_id`.
    ///
    /// Echo targets return the body untouched and never touch the
    /// correlation table. Bridged targets return the parsed callback body,
    /// or an error once the target deadline has elapsed.
    pub async fn bridge(&self, request_id: &str, body: Bytes) -> Result<BridgeOutcome, BridgeError> {
        let Some(target) = self.registry.get(request_id) else {
            debug!(request_id = request_id, "Bridge request for unknown target");
            return Err(BridgeError::NoSuchTarget(request_id.to_string()));
        };
        self.metrics.record_bridge();

        let Some(address) = target.forwarding_address().map(str::to_string) else {
            self.metrics.record_echo();
            debug!(request_id = request_id, bytes = body.len(), "Echoing non-bridged request");
            return Ok(BridgeOutcome::Echo(body));
        };

        let callback_id = CallbackId::new();
        let block = CorrelationBlock {
            callback_id,
            callback_address: target
                .wants_routable_callback()
                .then(|| self.config.callback_url(callback_id)),
            notify_address: target.callback_addr.clone(),
        };
        let payload = build_outbound(&body, &block).inspect_err(|e| {
            warn!(request_id = request_id, error = %e, "Cannot build outbound payload");
        })?;

        let handle = self
            .table
            .register(callback_id, &target.request_id)
            .inspect_err(|e| {
                error!(request_id = request_id, error = %e, "Correlation table rejected fresh id");
            })?;

        self.spawn_dispatch(callback_id, address, payload);

        let deadline = target.deadline();
        info!(
            request_id = request_id,
            callback_id = %callback_id,
            deadline_secs = deadline.as_secs(),
            "Waiting for callback"
        );

        let outcome = {
            let _waiting = WaitingGauge::enter(&self.metrics);
            handle.wait(deadline).await
        };

        match outcome {
            WaitOutcome::Delivered(delivery) => {
                let payload: Value = serde_json::from_slice(&delivery.payload).map_err(|source| {
                    self.metrics.record_malformed();
                    warn!(
                        callback_id = %callback_id,
                        error = %source,
                        "Callback body is not valid JSON"
                    );
                    BridgeError::MalformedCallback {
                        callback_id,
                        source,
                    }
                })?;

                self.metrics.record_fulfilled(delivery.wait_time);
                info!(
                    request_id = request_id,
                    callback_id = %callback_id,
                    wait_ms = delivery.wait_time.as_millis() as u64,
                    "Callback fulfilled bridge"
                );
                Ok(BridgeOutcome::Fulfilled {
                    payload,
                    source: delivery.source,
                    elapsed: delivery.wait_time,
                })
            }
            WaitOutcome::TimedOut => {
                self.metrics.record_timeout();
                warn!(
                    request_id = request_id,
                    callback_id = %callback_id,
                    deadline_secs = deadline.as_secs(),
                    "No callback before deadline"
                );
                Err(BridgeError::CallbackTimeout {
                    callback_id,
                    deadline,
                })
            }
            WaitOutcome::Abandoned => {
                error!(
                    request_id = request_id,
                    callback_id = %callback_id,
                    "Pending wait removed by a third party"
                );
                Err(BridgeError::Abandoned(callback_id))
            }
        }
    }

    /// Fire the outbound request without blocking the wait.
    ///
    /// Failures are logged and counted; the caller keeps waiting because the
    /// target may still call back.
    fn spawn_dispatch(&self, callback_id: CallbackId, address: String, payload: Value) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let metrics = Arc::clone(&self.metrics);

        tokio::spawn(async move {
            match dispatcher.dispatch(&address, &payload).await {
                Ok(receipt) => debug!(
                    callback_id = %callback_id,
                    address = %address,
                    status = receipt.status,
                    "Dispatched bridged request"
                ),
                Err(e) => {
                    metrics.record_dispatch_failure();
                    warn!(callback_id = %callback_id, error = %e, "Dispatch failed, still waiting");
                }
            }
        });
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

/// Keeps the `waiting` gauge right when the bridge future is dropped
/// mid-wait (caller disconnect).
struct WaitingGauge<'a>(&'a BridgeMetrics);

impl<'a> WaitingGauge<'a> {
    fn enter(metrics: &'a BridgeMetrics) -> Self {
        metrics.record_wait_started();
        Self(metrics)
    }
}

impl Drop for WaitingGauge<'_> {
    fn drop(&mut self) {
        self.0.record_wait_finished();
    }
}
