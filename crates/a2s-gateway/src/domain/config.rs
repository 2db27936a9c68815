//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Deadline applied to targets registered without `expire`
pub const DEFAULT_EXPIRE_SECS: u64 = 9999;

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Public HTTP listener
    pub http: HttpConfig,
    /// Admin listener (localhost only by default)
    pub admin: AdminConfig,
    /// Bridge behaviour
    pub bridge: BridgeConfig,
    /// Request limits
    pub limits: LimitsConfig,
    /// CORS configuration
    pub cors: CorsConfig,
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin.enabled && self.http_addr() == self.admin_addr() {
            return Err(ConfigError::DuplicatePorts);
        }

        if self.limits.max_request_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_request_size cannot be 0".into(),
            ));
        }

        if self.bridge.dispatch_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "dispatch_timeout cannot be 0".into(),
            ));
        }

        if let Some(max) = self.bridge.max_expire {
            if self.bridge.default_expire > max {
                return Err(ConfigError::InvalidTimeout(format!(
                    "default_expire {}s exceeds max_expire {}s",
                    self.bridge.default_expire, max
                )));
            }
        }

        let url = self.bridge.public_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "public_url must be an http(s) URL, got {:?}",
                self.bridge.public_url
            )));
        }

        Ok(())
    }

    /// Get public HTTP bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// Get Admin server bind address
    pub fn admin_addr(&self) -> SocketAddr {
        SocketAddr::new(self.admin.host, self.admin.port)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8000)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8000,
        }
    }
}

/// Admin server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bind address (localhost only by default)
    pub host: IpAddr,
    /// Port (default: 8081)
    pub port: u16,
    /// Enable admin server
    pub enabled: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8081,
            enabled: true,
        }
    }
}

/// Callback bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Deadline (seconds) for targets registered without one
    pub default_expire: u64,
    /// Upper bound on per-target deadlines; `None` = unbounded
    pub max_expire: Option<u64>,
    /// Externally reachable base URL used to build callback addresses
    pub public_url: String,
    /// Timeout for the outbound POST itself (not the callback wait)
    #[serde(with = "humantime_serde")]
    pub dispatch_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_expire: DEFAULT_EXPIRE_SECS,
            max_expire: None,
            public_url: "http://127.0.0.1:8000".to_string(),
            dispatch_timeout: Duration::from_secs(30),
        }
    }
}

impl BridgeConfig {
    /// Effective deadline for a registration request
    pub fn effective_expire(&self, requested: Option<u64>) -> u64 {
        let expire = requested.unwrap_or(self.default_expire);
        match self.max_expire {
            Some(max) => expire.min(max),
            None => expire,
        }
    }

    /// Callback URL for a given callback id
    pub fn callback_url(&self, callback_id: impl std::fmt::Display) -> String {
        format!(
            "{}/bridge/callback/{}",
            self.public_url.trim().trim_end_matches('/'),
            callback_id
        )
    }
}

/// Request limits configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Max request body size in bytes (default: 1MB)
    pub max_request_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: 1024 * 1024, // 1MB
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS
    pub enabled: bool,
    /// Allowed origins ("*" for all)
    pub allowed_origins: Vec<String>,
    /// Allowed methods ("*" for all)
    pub allowed_methods: Vec<String>,
    /// Allowed headers ("*" for all)
    pub allowed_headers: Vec<String>,
    /// Max age for preflight cache
    pub max_age: u64,
    /// Allow credentials
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["*".to_string()],
            allowed_headers: vec!["*".to_string()],
            max_age: 86400, // 24 hours
            allow_credentials: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Public and admin listeners share an address
    #[error("duplicate ports configured")]
    DuplicatePorts,
    /// Invalid size limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .ok()
                .and_then(|m| m.checked_mul(60))
                .map(Duration::from_secs)
                .ok_or("invalid minutes")
        } else {
            // Plain seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
