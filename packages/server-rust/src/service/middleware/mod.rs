//! Tower middleware layers for the dispatch pipeline.
//!
//! - [`metrics`]: Dispatch timing, outcome counters and tracing spans
//! - [`pipeline`]: Composes the layers around the `DispatchService`

pub mod metrics;
pub mod pipeline;

pub use metrics::MetricsLayer;
pub use pipeline::{build_dispatch_pipeline, DispatchPipeline};
