//! Adapters for the callback bridge.
//!
//! Infrastructure implementations: the correlation table, the target
//! registry, the HTTP dispatcher and the HTTP mapping of errors.

pub mod dispatcher;
pub mod error_conversions;
pub mod pending;
pub mod registry;

pub use dispatcher::HttpDispatcher;
pub use pending::{CorrelationTable, Delivery, DeliverySource, WaitHandle, WaitOutcome};
pub use registry::InMemoryTargetRegistry;
