// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! A2S gateway - turns an asynchronous webhook round trip into one
//! synchronous HTTP request.
//!
//! A caller posts to a registered target. The gateway forwards the body with
//! a correlation block injected, holds the caller's connection open, and
//! answers it with whatever the target later posts to the callback URL.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          A2S GATEWAY                             │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────────┐        ┌──────────────────┐        │
//! │  │  Public HTTP  :8000      │        │  Admin  :8081    │        │
//! │  │  /bridge  /targets  /a2s │        │ /metrics /pending│        │
//! │  └────────────┬─────────────┘        └──────────────────┘        │
//! │               │  Tracing → CORS → body limit                     │
//! │     ┌─────────┴──────────┐           ┌──────────────────┐        │
//! │     │   CallbackBridge   │──────────▶│  TargetRegistry  │        │
//! │     └──┬──────────────┬──┘           └──────────────────┘        │
//! │        │ register/    │ dispatch                                 │
//! │        │ wait         ▼                                          │
//! │        │     ┌────────────────────┐                              │
//! │        │     │ OutboundDispatcher │──── POST proxyAddr ───▶ target
//! │        ▼     └────────────────────┘                              │
//! │  ┌─────────────────────┐      ┌──────────────────┐               │
//! │  │  CorrelationTable   │◀─────│ CallbackReceiver │◀── callback ──┤
//! │  │ (oneshot per wait)  │      └──────────────────┘               │
//! │  └─────────────────────┘                                         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use a2s_gateway::{GatewayConfig, GatewayService};
//!
//! let mut service = GatewayService::new(GatewayConfig::default())?;
//! service.start().await?;
//! ```
//!
//! # Guarantees
//!
//! - A pending wait is registered before its request is dispatched
//! - For one callback id, the caller sees exactly one of delivery or timeout
//! - The first callback for an id wins; later ones get 404
//! - A pending wait never outlives the HTTP request that created it

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod bridge;
pub mod domain;
pub mod middleware;
pub mod ports;
pub mod receiver;
pub mod router;
pub mod service;

// Re-exports for public API
pub use adapters::{CorrelationTable, DeliverySource, HttpDispatcher, InMemoryTargetRegistry};
pub use bridge::{BridgeOutcome, CallbackBridge};
pub use domain::config::GatewayConfig;
pub use domain::error::{ApiError, ApiResult, BridgeError, GatewayError, ReceiveError};
pub use domain::{CallbackId, NewTarget, TargetRecord};
pub use middleware::BridgeMetrics;
pub use ports::{OutboundDispatcher, TargetRegistry};
pub use receiver::CallbackReceiver;
pub use service::GatewayService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
