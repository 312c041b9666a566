//! axum handlers and the state they share.

pub mod error;
pub mod health;
pub mod operations;

pub use error::ApiError;
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use operations::{
    collection_operation_handler, item_operation_handler, list_operations_handler,
};

use std::sync::Arc;
use std::time::Instant;

use hyperroute_core::Representor;

use super::{NetworkConfig, ShutdownController};
use crate::service::{build_dispatch_pipeline, DispatchPipeline, OperationDispatcher};

/// Shared application state handed to every handler via `State`.
#[derive(Clone)]
pub struct AppState {
    /// Metrics-instrumented dispatch service; cloned per request.
    pub pipeline: DispatchPipeline,
    pub dispatcher: Arc<OperationDispatcher>,
    pub representor: Arc<dyn Representor>,
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Used for the uptime reported by `/health`.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<OperationDispatcher>,
        representor: Arc<dyn Representor>,
        shutdown: Arc<ShutdownController>,
        config: Arc<NetworkConfig>,
    ) -> Self {
        Self {
            pipeline: build_dispatch_pipeline(Arc::clone(&dispatcher)),
            dispatcher,
            representor,
            shutdown,
            config,
            start_time: Instant::now(),
        }
    }
}
