//! Hyperroute Core — resource model, route tables, router contract and collaborator traits.

pub mod context;
pub mod error;
pub mod identifier;
pub mod model;
pub mod operation;
pub mod router;
pub mod routes;
pub mod traits;
pub mod types;

pub use context::RequestContext;
pub use error::{ConfigurationError, DispatchError};
pub use identifier::{Identifier, Path, ResourceIdentifier};
pub use model::{Body, SingleModel};
pub use operation::{Method, Operation, Scope};
pub use router::{ResourceRoutes, Router, RouterDescriptor};
pub use routes::{
    Affordances, CollectionHandler, CollectionRoutes, CollectionRoutesBuilder, IdentifierFunction,
    ItemHandler, ItemRoutes, ItemRoutesBuilder, Route, RouteBuildContext, RouteTable,
};
pub use traits::{NameRegistry, NoProviders, PathIdentifierMapper, ProviderManager, Representor};
pub use types::{Principal, ResourceName, TypeTag};
