//! HTTP outbound dispatcher.

use crate::domain::error::GatewayError;
use crate::ports::{DispatchError, DispatchReceipt, OutboundDispatcher};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Header carrying the gateway name on forwarded requests
const USER_AGENT: &str = concat!("a2s-gateway/", env!("CARGO_PKG_VERSION"));

/// Forwards bridged requests with a single `POST`.
///
/// The timeout bounds the POST only. How long the bridge waits for the
/// callback is the target's deadline and is enforced elsewhere.
pub struct HttpDispatcher {
    client: reqwest::Client,
}

impl HttpDispatcher {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl OutboundDispatcher for HttpDispatcher {
    async fn dispatch(
        &self,
        address: &str,
        payload: &serde_json::Value,
    ) -> Result<DispatchReceipt, DispatchError> {
        let resp = self
            .client
            .post(address)
            .json(payload)
            .send()
            .await
            .map_err(|e| DispatchError::Network {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DispatchError::Rejected {
                address: address.to_string(),
                status: status.as_u16(),
            });
        }

        debug!(address = address, status = status.as_u16(), "Target accepted dispatch");
        Ok(DispatchReceipt {
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_target_is_network_error() {
        let dispatcher = HttpDispatcher::new(Duration::from_millis(500)).unwrap();
        // Port 9 (discard) on localhost is closed in test environments
        let err = dispatcher
            .dispatch("http://127.0.0.1:9/hook", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Network { .. }));
    }

    #[tokio::test]
    async fn test_invalid_address_is_network_error() {
        let dispatcher = HttpDispatcher::new(Duration::from_millis(500)).unwrap();
        let err = dispatcher
            .dispatch("not a url", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Network { .. }));
    }
}
