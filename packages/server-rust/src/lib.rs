//! Hyperroute Server — router registry, operation dispatch and the axum HTTP binding.

pub mod demo;
pub mod network;
pub mod service;
pub mod telemetry;

pub use network::{NetworkConfig, NetworkModule};
pub use service::{OperationDispatcher, RouterRegistry};
