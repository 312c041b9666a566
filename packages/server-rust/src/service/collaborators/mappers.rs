use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use hyperroute_core::{Identifier, Path, PathIdentifierMapper, ResourceIdentifier, TypeTag};

type MapperFn = Arc<dyn Fn(&Path) -> Option<ResourceIdentifier> + Send + Sync>;

/// Raw id parsers keyed by identifier type.
#[derive(Default)]
pub struct IdentifierMappers {
    mappers: DashMap<TypeTag, MapperFn>,
}

impl IdentifierMappers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps raw ids of resources identified by `I` with `parse`. A `None`
    /// from `parse` means the raw id is not a valid identifier.
    pub fn register<I, F>(&self, parse: F)
    where
        I: Identifier,
        F: Fn(&str) -> Option<I::Id> + Send + Sync + 'static,
    {
        let mapper: MapperFn =
            Arc::new(move |path: &Path| parse(&path.id).map(ResourceIdentifier::new::<I>));
        self.mappers.insert(TypeTag::of::<I>(), mapper);
    }

    /// Maps raw ids with the identifier value's `FromStr` implementation.
    pub fn register_parsed<I>(&self)
    where
        I: Identifier,
        I::Id: FromStr,
    {
        self.register::<I, _>(|raw| raw.parse::<I::Id>().ok());
    }

    #[must_use]
    pub fn contains(&self, identifier_type: TypeTag) -> bool {
        self.mappers.contains_key(&identifier_type)
    }
}

impl PathIdentifierMapper for IdentifierMappers {
    fn map_to_identifier(
        &self,
        identifier_type: TypeTag,
        path: &Path,
    ) -> Option<ResourceIdentifier> {
        let mapper = self.mappers.get(&identifier_type)?.value().clone();
        mapper(path)
    }
}

impl fmt::Debug for IdentifierMappers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<&'static str> = self.mappers.iter().map(|e| e.key().name()).collect();
        f.debug_struct("IdentifierMappers")
            .field("identifier_types", &types)
            .finish()
    }
}
