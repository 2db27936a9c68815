//! Proxy target descriptors.
//!
//! Field names on the wire are camelCase to stay compatible with existing
//! A2S clients (`proxyAddr`, `callbackAddr`, `echoProxy`, ...).

use crate::domain::config::BridgeConfig;
use crate::domain::error::RegistryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A registered target that bridged requests are forwarded to.
///
/// Immutable once registered. The bridge only ever sees a clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRecord {
    /// Opaque request identifier
    pub request_id: String,
    /// Forwarding address. `None` means the target is non-bridged and
    /// requests against it are echoed back.
    pub proxy_addr: Option<String>,
    /// Out-of-band notification address, passed through as a routing hint
    pub callback_addr: Option<String>,
    /// Deadline in seconds
    pub expire: u64,
    /// Target calls back through this proxy, so it needs a routable
    /// callback address in the injected block
    pub echo_proxy: bool,
    /// Target issues callbacks with freshly generated identifiers
    pub random_callback: bool,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

impl TargetRecord {
    /// Forwarding address, if the target is bridged.
    ///
    /// Blank strings count as unset; existing clients send `""` for
    /// echo-only targets.
    pub fn forwarding_address(&self) -> Option<&str> {
        self.proxy_addr
            .as_deref()
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
    }

    /// Whether requests against this target go through the callback bridge
    pub fn is_bridged(&self) -> bool {
        self.forwarding_address().is_some()
    }

    /// Whether the injected correlation block carries a callback address
    pub fn wants_routable_callback(&self) -> bool {
        self.echo_proxy
    }

    /// Deadline for a bridged request
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.expire)
    }

    /// Build a record from a registration request, applying the configured
    /// deadline policy and generating an id when the caller gave none.
    pub fn from_registration(new: NewTarget, bridge: &BridgeConfig) -> Result<Self, RegistryError> {
        let request_id = match new.request_id.map(|id| id.trim().to_string()) {
            Some(id) if id.is_empty() => {
                return Err(RegistryError::InvalidTarget("requestID cannot be blank".into()))
            }
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };

        let proxy_addr = normalize_addr(new.proxy_addr, "proxyAddr")?;
        let callback_addr = normalize_addr(new.callback_addr, "callbackAddr")?;

        Ok(Self {
            request_id,
            proxy_addr,
            callback_addr,
            expire: bridge.effective_expire(new.expire),
            echo_proxy: new.echo_proxy,
            random_callback: new.random_callback,
            created_at: Utc::now(),
        })
    }
}

/// Blank addresses become `None`; anything else must be an http(s) URL.
fn normalize_addr(addr: Option<String>, field: &str) -> Result<Option<String>, RegistryError> {
    let Some(addr) = addr.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()) else {
        return Ok(None);
    };
    if addr.starts_with("http://") || addr.starts_with("https://") {
        Ok(Some(addr))
    } else {
        Err(RegistryError::InvalidTarget(format!(
            "{field} must be an http(s) URL, got {addr:?}"
        )))
    }
}

/// A target as the `/a2s/*` routes report it, keeping the field names
/// existing clients read back. Unset addresses are reported as `""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyTargetRecord {
    #[serde(rename = "requestID")]
    pub request_id: String,
    #[serde(rename = "echoProxy")]
    pub echo_proxy: bool,
    #[serde(rename = "randomCallBack")]
    pub random_callback: bool,
    #[serde(rename = "proxyAddr")]
    pub proxy_addr: String,
    #[serde(rename = "callBackAddr")]
    pub callback_addr: String,
    pub expire: u64,
}

impl From<TargetRecord> for LegacyTargetRecord {
    fn from(record: TargetRecord) -> Self {
        Self {
            request_id: record.request_id,
            echo_proxy: record.echo_proxy,
            random_callback: record.random_callback,
            proxy_addr: record.proxy_addr.unwrap_or_default(),
            callback_addr: record.callback_addr.unwrap_or_default(),
            expire: record.expire,
        }
    }
}

/// Registration request for a new target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewTarget {
    /// Caller-assigned identifier; generated when absent
    #[serde(rename = "requestID", alias = "requestId")]
    pub request_id: Option<String>,
    pub proxy_addr: Option<String>,
    #[serde(alias = "callBackAddr")]
    pub callback_addr: Option<String>,
    /// Deadline in seconds; the configured default applies when absent
    pub expire: Option<u64>,
    pub echo_proxy: bool,
    #[serde(alias = "randomCallBack")]
    pub random_callback: bool,
}
