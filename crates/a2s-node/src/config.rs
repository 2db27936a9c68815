//! Gateway configuration from `A2S_*` environment variables.
//!
//! Unset variables keep the defaults from [`GatewayConfig::default`]. A set
//! variable that does not parse is an error rather than silently ignored.

use a2s_gateway::GatewayConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{var}={value:?} is not a valid {expected}")]
pub struct EnvError {
    pub var: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Load configuration from the process environment.
pub fn load_config() -> Result<GatewayConfig, EnvError> {
    load_config_from(|key| env::var(key).ok())
}

/// Load configuration from an arbitrary variable source.
pub fn load_config_from(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<GatewayConfig, EnvError> {
    let mut config = GatewayConfig::default();

    // Listeners
    if let Some(host) = parse(&lookup, "A2S_HOST", "IP address")? {
        config.http.host = host;
    }
    if let Some(port) = parse(&lookup, "A2S_PORT", "port")? {
        config.http.port = port;
    }
    if let Some(port) = parse(&lookup, "A2S_ADMIN_PORT", "port")? {
        config.admin.port = port;
    }
    if let Some(enabled) = parse_bool(&lookup, "A2S_ADMIN_ENABLED")? {
        config.admin.enabled = enabled;
    }

    // Bridge
    match lookup("A2S_PUBLIC_URL") {
        Some(url) if !url.trim().is_empty() => config.bridge.public_url = url.trim().to_string(),
        // Without an explicit URL, advertise the local listener port
        _ => config.bridge.public_url = format!("http://127.0.0.1:{}", config.http.port),
    }
    if let Some(secs) = parse(&lookup, "A2S_DEFAULT_EXPIRE", "number of seconds")? {
        config.bridge.default_expire = secs;
    }
    if let Some(secs) = parse(&lookup, "A2S_MAX_EXPIRE", "number of seconds")? {
        config.bridge.max_expire = Some(secs);
    }
    if let Some(secs) = parse(&lookup, "A2S_DISPATCH_TIMEOUT_SECS", "number of seconds")? {
        config.bridge.dispatch_timeout = Duration::from_secs(secs);
    }

    // Limits
    if let Some(bytes) = parse(&lookup, "A2S_MAX_REQUEST_SIZE", "byte count")? {
        config.limits.max_request_size = bytes;
    }

    // CORS
    if let Some(origins) = lookup("A2S_CORS_ORIGINS") {
        config.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
    }

    Ok(config)
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    expected: &'static str,
) -> Result<Option<T>, EnvError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    value.trim().parse().map(Some).map_err(|_| EnvError {
        var,
        value,
        expected,
    })
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<bool>, EnvError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(Some(true)),
        "false" | "0" | "no" => Ok(Some(false)),
        _ => Err(EnvError {
            var,
            value,
            expected: "boolean",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::{IpAddr, Ipv4Addr};

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = load_config_from(vars(&[])).unwrap();
        assert_eq!(config.http.port, 8000);
        assert_eq!(config.bridge.public_url, "http://127.0.0.1:8000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = load_config_from(vars(&[
            ("A2S_HOST", "127.0.0.1"),
            ("A2S_PORT", "9000"),
            ("A2S_ADMIN_ENABLED", "false"),
            ("A2S_DEFAULT_EXPIRE", "30"),
            ("A2S_MAX_EXPIRE", "120"),
            ("A2S_DISPATCH_TIMEOUT_SECS", "5"),
            ("A2S_MAX_REQUEST_SIZE", "2048"),
            ("A2S_CORS_ORIGINS", "https://a.example, https://b.example"),
        ]))
        .unwrap();

        assert_eq!(config.http.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.http.port, 9000);
        assert!(!config.admin.enabled);
        assert_eq!(config.bridge.public_url, "http://127.0.0.1:9000");
        assert_eq!(config.bridge.default_expire, 30);
        assert_eq!(config.bridge.max_expire, Some(120));
        assert_eq!(config.bridge.dispatch_timeout, Duration::from_secs(5));
        assert_eq!(config.limits.max_request_size, 2048);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_public_url_override() {
        let config = load_config_from(vars(&[("A2S_PUBLIC_URL", "https://a2s.example.org")])).unwrap();
        assert_eq!(config.bridge.public_url, "https://a2s.example.org");
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err = load_config_from(vars(&[("A2S_PORT", "eighty")])).unwrap_err();
        assert_eq!(err.var, "A2S_PORT");

        let err = load_config_from(vars(&[("A2S_ADMIN_ENABLED", "maybe")])).unwrap_err();
        assert_eq!(err.expected, "boolean");
    }
}
