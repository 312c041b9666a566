//! Resource identifiers and the structural paths they are resolved from.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::types::{ResourceName, TypeTag};

/// Marker implemented by exactly one type per resource.
///
/// The marker's [`TypeTag`] is what the name registry and the path
/// identifier mappers are keyed by; `Id` is the value handlers receive.
pub trait Identifier: Send + Sync + 'static {
    /// Concrete identifier value (e.g. `u64` or a composite key).
    type Id: Clone + Send + Sync + fmt::Debug + 'static;
}

/// Structural path of one resource item: resource name plus the raw id
/// segment as it arrived from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    pub name: ResourceName,
    pub id: String,
}

impl Path {
    pub fn new(name: ResourceName, id: impl Into<String>) -> Self {
        Self {
            name,
            id: id.into(),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.id)
    }
}

/// Opaque, typed identifier produced by a path identifier mapper.
///
/// Carries the identifier type it was produced for, so the dispatch core can
/// hand it around without knowing the concrete `Id` type.
#[derive(Clone)]
pub struct ResourceIdentifier {
    identifier_type: TypeTag,
    value: Arc<dyn Any + Send + Sync>,
    debug: Arc<str>,
}

impl ResourceIdentifier {
    /// Wraps the id value for identifier marker `I`.
    pub fn new<I: Identifier>(value: I::Id) -> Self {
        Self::tagged(TypeTag::of::<I>(), value)
    }

    /// Wraps a value under an explicit identifier type tag.
    pub fn tagged<V>(identifier_type: TypeTag, value: V) -> Self
    where
        V: Send + Sync + fmt::Debug + 'static,
    {
        let debug = Arc::from(format!("{value:?}"));
        Self {
            identifier_type,
            value: Arc::new(value),
            debug,
        }
    }

    #[must_use]
    pub fn identifier_type(&self) -> TypeTag {
        self.identifier_type
    }

    /// Returns the id value if it was produced for marker `I`.
    #[must_use]
    pub fn value<I: Identifier>(&self) -> Option<&I::Id> {
        if self.identifier_type != TypeTag::of::<I>() {
            return None;
        }
        self.value.downcast_ref::<I::Id>()
    }

    /// Untyped downcast, ignoring the identifier type tag.
    #[must_use]
    pub fn downcast_ref<V: 'static>(&self) -> Option<&V> {
        self.value.downcast_ref::<V>()
    }
}

impl fmt::Debug for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceIdentifier")
            .field("identifier_type", &self.identifier_type.name())
            .field("value", &&*self.debug)
            .finish()
    }
}

impl PartialEq for ResourceIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.identifier_type == other.identifier_type && self.debug == other.debug
    }
}
