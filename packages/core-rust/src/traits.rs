use std::any::Any;
use std::sync::Arc;

use serde_json::Value;

use crate::context::RequestContext;
use crate::identifier::{Path, ResourceIdentifier};
use crate::model::SingleModel;
use crate::types::{ResourceName, TypeTag};

/// Maps an identifier type to the resource name it is exposed under.
pub trait NameRegistry: Send + Sync {
    fn name_for(&self, identifier_type: TypeTag) -> Option<ResourceName>;
}

/// Converts a structural path into a typed identifier.
///
/// Returns `None` when no mapper exists for `identifier_type` or when the
/// raw id cannot be converted. Implementations must be deterministic.
pub trait PathIdentifierMapper: Send + Sync {
    fn map_to_identifier(&self, identifier_type: TypeTag, path: &Path)
        -> Option<ResourceIdentifier>;
}

/// Supplies request-scoped dependencies (credentials, pagination, services)
/// to handlers that declare them.
pub trait ProviderManager: Send + Sync {
    fn provide(&self, type_tag: TypeTag, ctx: &RequestContext)
        -> Option<Arc<dyn Any + Send + Sync>>;
}

impl dyn ProviderManager {
    /// Typed convenience over [`ProviderManager::provide`].
    pub fn provide_as<A: Clone + 'static>(&self, ctx: &RequestContext) -> Option<A> {
        self.provide(TypeTag::of::<A>(), ctx)
            .and_then(|value| value.downcast_ref::<A>().cloned())
    }
}

/// Turns a resolved model into its wire representation.
pub trait Representor: Send + Sync {
    fn represent(&self, model: &SingleModel) -> Option<Value>;
}

/// Provider manager with nothing registered.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProviders;

impl ProviderManager for NoProviders {
    fn provide(
        &self,
        _type_tag: TypeTag,
        _ctx: &RequestContext,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }
}
