//! Pipeline composition: wraps the `DispatchService` in its middleware.

use std::sync::Arc;

use tower::ServiceBuilder;

use super::metrics::{MetricsLayer, MetricsService};
use crate::service::dispatcher::OperationDispatcher;
use crate::service::router::DispatchService;

/// The composed dispatch service.
pub type DispatchPipeline = MetricsService<DispatchService>;

/// Build the dispatch pipeline around `dispatcher`.
///
/// Layer order (outermost to innermost):
/// 1. `MetricsLayer` -- record timing and outcome
/// 2. `DispatchService` -- run the handler on the blocking pool
///
/// No timeout is imposed here; transports add their own. The returned
/// service is cheap to clone.
#[must_use]
pub fn build_dispatch_pipeline(dispatcher: Arc<OperationDispatcher>) -> DispatchPipeline {
    ServiceBuilder::new()
        .layer(MetricsLayer::new(Arc::clone(dispatcher.registry())))
        .service(DispatchService::new(dispatcher))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use hyperroute_core::{Body, Method, RequestContext};
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::demo::{self, Book, Library};
    use crate::service::operation::DispatchRequest;
    use crate::service::registry::RouterRegistry;

    fn dispatcher() -> Arc<OperationDispatcher> {
        let collaborators = demo::collaborators();
        let registry = Arc::new(RouterRegistry::new(
            collaborators.name_registry(),
            collaborators.identifier_mapper(),
            collaborators.provider_manager(),
        ));
        registry
            .register(&demo::descriptor(Arc::new(Library::seeded())))
            .unwrap();
        Arc::new(OperationDispatcher::new(registry))
    }

    #[tokio::test]
    async fn pipeline_routes_through_all_layers() {
        let svc = build_dispatch_pipeline(dispatcher());
        let request = DispatchRequest::item(
            RequestContext::new("req"),
            "Books",
            "2",
            "renew",
            Method::Put,
            Body::json(json!({})),
        );
        let model = svc.oneshot(request).await.unwrap();
        assert_eq!(model.model::<Book>().unwrap().due_in_days, Some(14));
    }

    #[tokio::test]
    async fn pipeline_clones_share_the_registry() {
        let dispatcher = dispatcher();
        let svc = build_dispatch_pipeline(Arc::clone(&dispatcher));
        let first = svc.clone();

        dispatcher.registry().unregister(demo::BOOKS_KEY);

        let request = DispatchRequest::collection(
            RequestContext::new("req"),
            "Books",
            "checkout",
            Method::Post,
            Body::empty(),
        );
        let err = first.oneshot(request).await.unwrap_err();
        assert_eq!(err.kind(), "route_not_found");
    }
}
