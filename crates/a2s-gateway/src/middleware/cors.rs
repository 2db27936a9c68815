//! CORS layer built from gateway configuration.
//!
//! The default configuration allows any origin, method and header so that
//! browser clients can drive the bridge directly.

use crate::domain::config::CorsConfig;
use axum::http::{HeaderName, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer as TowerCorsLayer};
use tracing::warn;

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v.trim() == "*")
}

/// Create CORS layer from gateway config
pub fn create_cors_layer(config: &CorsConfig) -> TowerCorsLayer {
    if !config.enabled {
        // No CORS headers at all; browsers fall back to same-origin
        return TowerCorsLayer::new();
    }

    let mut cors = TowerCorsLayer::new();

    // Configure origins
    let any_origin = is_wildcard(&config.allowed_origins);
    if any_origin {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.trim().parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    // Configure methods
    if is_wildcard(&config.allowed_methods) {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Vec<Method> = config
            .allowed_methods
            .iter()
            .filter_map(|m| m.trim().to_uppercase().parse().ok())
            .collect();
        cors = cors.allow_methods(methods);
    }

    // Configure headers
    if is_wildcard(&config.allowed_headers) {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<HeaderName> = config
            .allowed_headers
            .iter()
            .filter_map(|h| h.trim().parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    cors = cors.max_age(Duration::from_secs(config.max_age));

    // tower-http rejects credentials combined with wildcards
    if config.allow_credentials {
        if any_origin || is_wildcard(&config.allowed_methods) || is_wildcard(&config.allowed_headers) {
            warn!("CORS allow_credentials ignored: not allowed together with wildcard rules");
        } else {
            cors = cors.allow_credentials(true);
        }
    }

    cors
}
