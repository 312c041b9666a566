//! Router registry: binds routers to resource names and publishes their
//! route tables.
//!
//! Each registration is built completely outside the map, then published as
//! a single `Arc<RouterBinding>` insert. Readers take one `Arc` per request,
//! so they observe either the previous binding or the new one.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hyperroute_core::{
    Affordances, CollectionRoutes, ConfigurationError, IdentifierFunction, ItemRoutes,
    NameRegistry, Operation, Path, PathIdentifierMapper, ProviderManager, ResourceName,
    RouteBuildContext, RouterDescriptor, TypeTag,
};
use tracing::{debug, error, info, warn};

use super::config::{DispatchConfig, DuplicatePolicy};
use super::lifecycle::{ManagedService, ServiceContext};

// ---------------------------------------------------------------------------
// RouterBinding
// ---------------------------------------------------------------------------

/// Published registration of one router under one resource name.
pub struct RouterBinding {
    key: String,
    resource: ResourceName,
    model_type: TypeTag,
    identifier_type: TypeTag,
    collection: Option<CollectionRoutes>,
    item: Option<ItemRoutes>,
    identifier_fn: IdentifierFunction,
    operations: Vec<Operation>,
    version: u64,
}

impl RouterBinding {
    /// Plugin key of the router that produced this binding.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn resource(&self) -> &ResourceName {
        &self.resource
    }

    #[must_use]
    pub fn model_type(&self) -> TypeTag {
        self.model_type
    }

    #[must_use]
    pub fn identifier_type(&self) -> TypeTag {
        self.identifier_type
    }

    #[must_use]
    pub fn collection(&self) -> Option<&CollectionRoutes> {
        self.collection.as_ref()
    }

    #[must_use]
    pub fn item(&self) -> Option<&ItemRoutes> {
        self.item.as_ref()
    }

    #[must_use]
    pub fn identifier_fn(&self) -> &IdentifierFunction {
        &self.identifier_fn
    }

    /// Collection operations followed by item operations.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Registry version at which this binding was published.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl fmt::Debug for RouterBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBinding")
            .field("key", &self.key)
            .field("resource", &self.resource)
            .field("model_type", &self.model_type)
            .field("identifier_type", &self.identifier_type)
            .field("collection", &self.collection)
            .field("item", &self.item)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// RouterRegistry
// ---------------------------------------------------------------------------

/// Concurrent registry of router bindings, keyed by resource name.
///
/// A secondary index maps plugin keys to the resource they are bound to, so
/// lifecycle events that only carry the key can find their binding.
pub struct RouterRegistry {
    bindings: DashMap<ResourceName, Arc<RouterBinding>>,
    keys: DashMap<String, ResourceName>,
    version: AtomicU64,
    names: Arc<dyn NameRegistry>,
    mappers: Arc<dyn PathIdentifierMapper>,
    providers: Arc<dyn ProviderManager>,
    policy: DuplicatePolicy,
}

impl RouterRegistry {
    /// Creates an empty registry over the given collaborators, rejecting
    /// duplicate resource names.
    pub fn new(
        names: Arc<dyn NameRegistry>,
        mappers: Arc<dyn PathIdentifierMapper>,
        providers: Arc<dyn ProviderManager>,
    ) -> Self {
        Self {
            bindings: DashMap::new(),
            keys: DashMap::new(),
            version: AtomicU64::new(0),
            names,
            mappers,
            providers,
            policy: DuplicatePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_config(self, config: &DispatchConfig) -> Self {
        self.with_duplicate_policy(config.duplicate_policy)
    }

    #[must_use]
    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Registers a router and publishes its binding.
    ///
    /// Registering a key that is already bound replaces its binding.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the router's types cannot be
    /// resolved, its tables fail to build, or its resource name is held by
    /// another plugin under [`DuplicatePolicy::Reject`]. The registry is left
    /// unchanged in that case.
    pub fn register(
        &self,
        descriptor: &RouterDescriptor,
    ) -> Result<Arc<RouterBinding>, ConfigurationError> {
        let binding = self.publish(descriptor).inspect_err(|err| {
            error!(key = descriptor.key(), error = %err, "router registration failed");
        })?;
        info!(
            key = binding.key(),
            resource = %binding.resource(),
            operations = binding.operations().len(),
            version = binding.version(),
            "router registered"
        );
        Ok(binding)
    }

    /// Rebuilds the binding of an already registered router.
    ///
    /// Behaves like [`register`](Self::register); a key seen for the first
    /// time is registered.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register). On failure the previous binding
    /// stays published.
    pub fn update(
        &self,
        descriptor: &RouterDescriptor,
    ) -> Result<Arc<RouterBinding>, ConfigurationError> {
        if !self.keys.contains_key(descriptor.key()) {
            debug!(key = descriptor.key(), "update for unknown router, registering");
        }
        let binding = self.publish(descriptor).inspect_err(|err| {
            error!(key = descriptor.key(), error = %err, "router update failed");
        })?;
        info!(
            key = binding.key(),
            resource = %binding.resource(),
            operations = binding.operations().len(),
            version = binding.version(),
            "router updated"
        );
        Ok(binding)
    }

    /// Removes the binding contributed by `key`.
    ///
    /// A binding that has since been taken over by another plugin is left in
    /// place. Returns the removed binding, if any.
    pub fn unregister(&self, key: &str) -> Option<Arc<RouterBinding>> {
        let (_, resource) = self.keys.remove(key)?;
        let removed = self
            .bindings
            .remove_if(&resource, |_, binding| binding.key() == key)
            .map(|(_, binding)| binding);
        match &removed {
            Some(binding) => info!(key, resource = %binding.resource(), "router unregistered"),
            None => debug!(key, %resource, "binding already replaced, nothing to unregister"),
        }
        removed
    }

    /// Current binding for `resource`.
    #[must_use]
    pub fn binding(&self, resource: &str) -> Option<Arc<RouterBinding>> {
        self.bindings
            .get(resource)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Resource name currently bound to plugin `key`.
    #[must_use]
    pub fn resource_for_key(&self, key: &str) -> Option<ResourceName> {
        self.keys.get(key).map(|entry| entry.value().clone())
    }

    /// Registered resource names, sorted.
    #[must_use]
    pub fn resources(&self) -> Vec<ResourceName> {
        let mut names: Vec<ResourceName> =
            self.bindings.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Number of publications so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Drops every binding.
    pub fn clear(&self) {
        let count = self.bindings.len();
        self.bindings.clear();
        self.keys.clear();
        info!(count, "router registry cleared");
    }

    fn publish(
        &self,
        descriptor: &RouterDescriptor,
    ) -> Result<Arc<RouterBinding>, ConfigurationError> {
        let key = descriptor.key();
        let model_type = descriptor.model_type()?;
        let identifier_type = descriptor.identifier_type()?;
        let resource = self.names.name_for(identifier_type).ok_or_else(|| {
            ConfigurationError::MustHaveValidGenericType {
                router: key.to_string(),
                detail: format!(
                    "no resource name registered for identifier type {identifier_type}"
                ),
            }
        })?;

        let identifier_fn = self.identifier_function(identifier_type);
        let affordances = Arc::new(Affordances::default());
        let ctx = RouteBuildContext {
            resource: resource.clone(),
            model_type,
            identifier_type,
            providers: Arc::clone(&self.providers),
            identifier_fn: Arc::clone(&identifier_fn),
            affordances: Arc::clone(&affordances),
        };
        let routes = descriptor.build(&ctx).map_err(|err| match err {
            ConfigurationError::MustHaveValidGenericType { detail, .. } => {
                ConfigurationError::MustHaveValidGenericType {
                    router: key.to_string(),
                    detail,
                }
            }
            other => other,
        })?;
        let operations = routes.operations();
        affordances.publish(operations.clone());

        let entry = self.bindings.entry(resource.clone());
        let displaced = match &entry {
            Entry::Occupied(occupied) if occupied.get().key() != key => {
                let existing = occupied.get().key().to_string();
                if self.policy == DuplicatePolicy::Reject {
                    return Err(ConfigurationError::DuplicateResourceName {
                        resource,
                        existing,
                        incoming: key.to_string(),
                    });
                }
                warn!(
                    %resource,
                    existing = %existing,
                    incoming = key,
                    "resource name taken over by another router"
                );
                Some(existing)
            }
            _ => None,
        };
        let binding = Arc::new(RouterBinding {
            key: key.to_string(),
            resource: resource.clone(),
            model_type,
            identifier_type,
            collection: routes.collection,
            item: routes.item,
            identifier_fn,
            operations,
            version: self.next_version(),
        });
        entry.insert(Arc::clone(&binding));

        if let Some(displaced) = displaced {
            self.keys.remove_if(&displaced, |_, bound| *bound == resource);
        }
        // Same router, new resource name: drop what it left under the old one.
        if let Some(previous) = self.keys.insert(key.to_string(), resource.clone()) {
            if previous != resource {
                self.bindings
                    .remove_if(&previous, |_, stale| stale.key() == key);
                debug!(key, from = %previous, to = %resource, "router moved to a new resource name");
            }
        }
        Ok(binding)
    }

    fn identifier_function(&self, identifier_type: TypeTag) -> IdentifierFunction {
        let mappers = Arc::clone(&self.mappers);
        Arc::new(move |path: &Path| {
            mappers
                .map_to_identifier(identifier_type, path)
                .filter(|identifier| identifier.identifier_type() == identifier_type)
                .ok_or(ConfigurationError::MustHavePathIdentifierMapper {
                    identifier_type: identifier_type.name(),
                })
        })
    }

    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl fmt::Debug for RouterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterRegistry")
            .field("resources", &self.resources())
            .field("version", &self.version())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ManagedService for RouterRegistry {
    fn name(&self) -> &'static str {
        "router-registry"
    }

    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        info!(
            policy = ?ctx.config.duplicate_policy,
            resources = self.len(),
            "router registry ready"
        );
        Ok(())
    }

    async fn reset(&self) -> anyhow::Result<()> {
        self.clear();
        Ok(())
    }

    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        self.clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
