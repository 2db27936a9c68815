//! Ports the core depends on: where targets come from and how requests leave.

pub mod outbound;

pub use outbound::{DispatchError, DispatchReceipt, OutboundDispatcher, TargetRegistry};
