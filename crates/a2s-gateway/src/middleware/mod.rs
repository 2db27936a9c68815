//! HTTP middleware for the bridge listeners.
//!
//! Layer order (outermost first): Tracing → CORS → body limit → handler.

pub mod cors;
pub mod metrics;
pub mod tracing;

pub use cors::create_cors_layer;
pub use metrics::BridgeMetrics;
pub use tracing::TracingLayer;
