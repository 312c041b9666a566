//! `tower` entry point of the dispatch pipeline.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use hyperroute_core::{DispatchError, SingleModel};
use tower::Service;
use tracing::error;

use super::dispatcher::OperationDispatcher;
use super::operation::DispatchRequest;

type DispatchFuture = Pin<Box<dyn Future<Output = Result<SingleModel, DispatchError>> + Send>>;

/// Runs each `DispatchRequest` through the dispatcher on the blocking pool.
///
/// Handlers are plain synchronous functions that may block, so they never
/// run on an async worker thread. A handler panic surfaces as
/// `HandlerInvocationFailed`.
#[derive(Debug, Clone)]
pub struct DispatchService {
    dispatcher: Arc<OperationDispatcher>,
}

impl DispatchService {
    pub fn new(dispatcher: Arc<OperationDispatcher>) -> Self {
        Self { dispatcher }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<OperationDispatcher> {
        &self.dispatcher
    }
}

impl Service<DispatchRequest> for DispatchService {
    type Response = SingleModel;
    type Error = DispatchError;
    type Future = DispatchFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: DispatchRequest) -> Self::Future {
        let dispatcher = Arc::clone(&self.dispatcher);
        Box::pin(async move {
            let resource = request.resource.clone();
            let operation = request.operation.clone();
            tokio::task::spawn_blocking(move || dispatcher.dispatch(request))
                .await
                .map_err(|join_error| {
                    error!(%resource, %operation, error = %join_error, "handler did not complete");
                    let cause = if join_error.is_panic() {
                        anyhow::anyhow!("handler for {resource}/{operation} panicked")
                    } else {
                        anyhow::anyhow!("handler for {resource}/{operation} was cancelled")
                    };
                    DispatchError::HandlerInvocationFailed(cause)
                })?
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
