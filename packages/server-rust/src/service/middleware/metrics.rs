//! Metrics middleware for dispatches.
//!
//! Records each dispatch in an `info` span and through the `metrics` facade:
//! `hyperroute_dispatch_total` (counter, by resource and outcome) and
//! `hyperroute_dispatch_duration_seconds` (histogram, by resource). Without
//! an installed recorder the facade calls are no-ops.
//!
//! The `resource` label carries the resource name only while a router is
//! bound to it; every other name is recorded as [`UNREGISTERED_RESOURCE`],
//! so label cardinality is bounded by the registry, not by request input.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use hyperroute_core::{DispatchError, SingleModel};
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::operation::DispatchRequest;
use crate::service::registry::RouterRegistry;

pub const DISPATCH_TOTAL: &str = "hyperroute_dispatch_total";
pub const DISPATCH_DURATION_SECONDS: &str = "hyperroute_dispatch_duration_seconds";
pub const UNREGISTERED_RESOURCE: &str = "unregistered";

/// Metric label for `resource`: the name itself when bound, otherwise
/// [`UNREGISTERED_RESOURCE`].
#[must_use]
pub fn resource_label(registry: &RouterRegistry, resource: &str) -> String {
    if registry.binding(resource).is_some() {
        resource.to_owned()
    } else {
        UNREGISTERED_RESOURCE.to_owned()
    }
}

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments dispatches with timing and outcome.
#[derive(Debug, Clone)]
pub struct MetricsLayer {
    registry: Arc<RouterRegistry>,
}

impl MetricsLayer {
    /// Label resources against the bindings in `registry`.
    #[must_use]
    pub fn new(registry: Arc<RouterRegistry>) -> Self {
        Self { registry }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            registry: Arc::clone(&self.registry),
        }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records dispatch duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
    registry: Arc<RouterRegistry>,
}

impl<S> Service<DispatchRequest> for MetricsService<S>
where
    S: Service<DispatchRequest, Response = SingleModel, Error = DispatchError> + Send,
    S::Future: Send + 'static,
{
    type Response = SingleModel;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<SingleModel, DispatchError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: DispatchRequest) -> Self::Future {
        let resource = request.resource.clone();
        let operation = request.operation.clone();
        let method = request.method.as_str();
        let scope = request.scope();

        let span = info_span!(
            "dispatch",
            request_id = %request.ctx.request_id,
            resource = %resource,
            operation = %operation,
            method,
            %scope,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let registry = Arc::clone(&self.registry);
        let fut = self.inner.call(request);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();

                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(err) => err.kind(),
                };

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                let label = resource_label(&registry, &resource);
                metrics::counter!(
                    DISPATCH_TOTAL,
                    "resource" => label.clone(),
                    "outcome" => outcome
                )
                .increment(1);
                metrics::histogram!(DISPATCH_DURATION_SECONDS, "resource" => label)
                    .record(elapsed.as_secs_f64());

                tracing::info!(
                    resource = %resource,
                    operation = %operation,
                    method,
                    duration_ms,
                    outcome,
                    "dispatch complete"
                );

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
