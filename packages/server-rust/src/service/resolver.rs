//! Identifier resolution: raw id segment to typed resource identifier.

use std::sync::Arc;

use hyperroute_core::{DispatchError, Path, ResourceIdentifier, ResourceName};
use tracing::debug;

use super::registry::{RouterBinding, RouterRegistry};

/// Resolves raw ids against the identifier function of the current binding.
#[derive(Debug, Clone)]
pub struct IdentifierResolver {
    registry: Arc<RouterRegistry>,
}

impl IdentifierResolver {
    pub fn new(registry: Arc<RouterRegistry>) -> Self {
        Self { registry }
    }

    /// Maps `raw_id` of `resource` to its identifier.
    ///
    /// # Errors
    ///
    /// `IdentifierMappingFailed` if the resource is not registered, no
    /// mapper exists for its identifier type, or the raw id does not convert.
    pub fn resolve(
        &self,
        resource: &str,
        raw_id: &str,
    ) -> Result<ResourceIdentifier, DispatchError> {
        match self.registry.binding(resource) {
            Some(binding) => Self::resolve_in(&binding, raw_id),
            None => Err(DispatchError::IdentifierMappingFailed {
                resource: ResourceName::new(resource),
                raw_id: raw_id.to_string(),
                identifier_type: None,
            }),
        }
    }

    /// Maps `raw_id` with a binding the caller already holds.
    ///
    /// # Errors
    ///
    /// `IdentifierMappingFailed` if the binding's identifier function rejects
    /// the path.
    pub fn resolve_in(
        binding: &RouterBinding,
        raw_id: &str,
    ) -> Result<ResourceIdentifier, DispatchError> {
        let path = Path::new(binding.resource().clone(), raw_id);
        (binding.identifier_fn())(&path).map_err(|cause| {
            debug!(%path, %cause, "identifier mapping failed");
            DispatchError::IdentifierMappingFailed {
                resource: binding.resource().clone(),
                raw_id: raw_id.to_string(),
                identifier_type: Some(binding.identifier_type().name()),
            }
        })
    }
}
