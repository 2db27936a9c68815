//! Domain types for the callback bridge.
//!
//! Pure data and error types. The correlation table and the registry live in
//! the adapters layer because they own concurrency primitives.

pub mod config;
pub mod correlation;
pub mod error;
pub mod payload;
pub mod target;

// Re-exports for convenience
pub use config::{BridgeConfig, ConfigError, CorsConfig, GatewayConfig, LimitsConfig};
pub use correlation::CallbackId;
pub use error::{ApiError, ApiResult, BridgeError, GatewayError, ReceiveError, RegistryError};
pub use payload::{build_outbound, CorrelationBlock, PayloadError, CORRELATION_KEY};
pub use target::{LegacyTargetRecord, NewTarget, TargetRecord};
