//! HTTP binding: configuration, routes, middleware and graceful shutdown.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use config::NetworkConfig;
pub use handlers::{ApiError, AppState};
pub use module::{build_app, NetworkModule};
pub use shutdown::{HealthState, InFlightGuard, ShutdownController};
