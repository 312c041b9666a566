//! In-memory implementations of the collaborator contracts the router
//! registry and the HTTP binding consume.
//!
//! - [`names`]: identifier type to resource name catalog
//! - [`mappers`]: per-identifier-type raw id parsers
//! - [`providers`]: request-scoped dependency factories
//! - [`representor`]: `serde` based model representation

pub mod mappers;
pub mod names;
pub mod providers;
pub mod representor;

use std::sync::Arc;

use hyperroute_core::{NameRegistry, PathIdentifierMapper, ProviderManager, Representor};

pub use mappers::IdentifierMappers;
pub use names::NameCatalog;
pub use providers::Providers;
pub use representor::JsonRepresentor;

/// Bundle of the in-memory collaborators, shared by the registry and the
/// transport.
#[derive(Debug, Clone, Default)]
pub struct Collaborators {
    pub names: Arc<NameCatalog>,
    pub mappers: Arc<IdentifierMappers>,
    pub providers: Arc<Providers>,
    pub representor: Arc<JsonRepresentor>,
}

impl Collaborators {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name_registry(&self) -> Arc<dyn NameRegistry> {
        self.names.clone()
    }

    #[must_use]
    pub fn identifier_mapper(&self) -> Arc<dyn PathIdentifierMapper> {
        self.mappers.clone()
    }

    #[must_use]
    pub fn provider_manager(&self) -> Arc<dyn ProviderManager> {
        self.providers.clone()
    }

    #[must_use]
    pub fn representor(&self) -> Arc<dyn Representor> {
        self.representor.clone()
    }
}
