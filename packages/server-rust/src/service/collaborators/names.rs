use dashmap::DashMap;
use hyperroute_core::{Identifier, NameRegistry, ResourceName, TypeTag};

/// Catalog of resource names keyed by identifier type.
#[derive(Debug, Default)]
pub struct NameCatalog {
    names: DashMap<TypeTag, ResourceName>,
}

impl NameCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exposes resources identified by `I` under `name`. Replaces any name
    /// previously given to `I`.
    pub fn register<I: Identifier>(&self, name: impl Into<ResourceName>) {
        self.insert(TypeTag::of::<I>(), name.into());
    }

    pub fn insert(&self, identifier_type: TypeTag, name: ResourceName) {
        self.names.insert(identifier_type, name);
    }

    pub fn remove<I: Identifier>(&self) -> Option<ResourceName> {
        self.names.remove(&TypeTag::of::<I>()).map(|(_, name)| name)
    }
}

impl NameRegistry for NameCatalog {
    fn name_for(&self, identifier_type: TypeTag) -> Option<ResourceName> {
        self.names.get(&identifier_type).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BookId;
    impl Identifier for BookId {
        type Id = u64;
    }

    struct AuthorId;
    impl Identifier for AuthorId {
        type Id = String;
    }

    #[test]
    fn names_are_keyed_by_identifier_type() {
        let catalog = NameCatalog::new();
        catalog.register::<BookId>("Books");

        assert_eq!(catalog.name_for(TypeTag::of::<BookId>()), Some(ResourceName::new("Books")));
        assert_eq!(catalog.name_for(TypeTag::of::<AuthorId>()), None);
    }

    #[test]
    fn remove_forgets_the_name() {
        let catalog = NameCatalog::new();
        catalog.register::<BookId>("Books");
        assert_eq!(catalog.remove::<BookId>(), Some(ResourceName::new("Books")));
        assert_eq!(catalog.name_for(TypeTag::of::<BookId>()), None);
    }
}
