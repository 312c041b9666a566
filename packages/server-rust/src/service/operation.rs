//! Request type carried through the dispatch pipeline.

use std::any::Any;
use std::sync::Arc;

use hyperroute_core::{Body, Method, RequestContext, Scope};

/// One custom-operation invocation, as decoded by the transport.
///
/// `id` is present for item-scoped requests and absent for collection-scoped
/// ones.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub ctx: RequestContext,
    pub resource: String,
    pub operation: String,
    pub id: Option<String>,
    pub method: Method,
    pub body: Body,
    pub(crate) lease: Option<Arc<dyn Any + Send + Sync>>,
}

impl DispatchRequest {
    pub fn collection(
        ctx: RequestContext,
        resource: impl Into<String>,
        operation: impl Into<String>,
        method: Method,
        body: Body,
    ) -> Self {
        Self {
            ctx,
            resource: resource.into(),
            operation: operation.into(),
            id: None,
            method,
            body,
            lease: None,
        }
    }

    pub fn item(
        ctx: RequestContext,
        resource: impl Into<String>,
        id: impl Into<String>,
        operation: impl Into<String>,
        method: Method,
        body: Body,
    ) -> Self {
        Self {
            ctx,
            resource: resource.into(),
            operation: operation.into(),
            id: Some(id.into()),
            method,
            body,
            lease: None,
        }
    }

    /// Attaches a value that is dropped only once the handler has returned,
    /// even if the caller stops waiting for the response first.
    #[must_use]
    pub fn with_lease(mut self, lease: impl Any + Send + Sync) -> Self {
        self.lease = Some(Arc::new(lease));
        self
    }

    #[must_use]
    pub fn scope(&self) -> Scope {
        if self.id.is_some() {
            Scope::Item
        } else {
            Scope::Collection
        }
    }
}
