//! Router registration and operation dispatch.
//!
//! This module implements the dispatch side of the server:
//!
//! 1. **Registry** (`registry`): `RouterDescriptor` -> published `RouterBinding`
//! 2. **Resolution** (`resolver`): raw id -> `ResourceIdentifier`
//! 3. **Dispatch** (`dispatcher`): (resource, operation, method, id?) -> handler
//! 4. **Pipeline** (`router`, `middleware`): Tower service stack over the dispatcher
//! 5. **Background workers** (`worker`): Router lifecycle events
//! 6. **Lifecycle** (`lifecycle`): Init/reset/shutdown ordering of managed services
//! 7. **Collaborators** (`collaborators`): In-memory name, mapper, provider, representor

pub mod collaborators;
pub mod config;
pub mod dispatcher;
pub mod lifecycle;
pub mod middleware;
pub mod operation;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod worker;

// Re-export key types for convenient access.
pub use collaborators::{Collaborators, IdentifierMappers, JsonRepresentor, NameCatalog, Providers};
pub use config::{DispatchConfig, DuplicatePolicy};
pub use dispatcher::OperationDispatcher;
pub use lifecycle::{ManagedService, ServiceContext, ServiceRegistry};
pub use middleware::{build_dispatch_pipeline, DispatchPipeline, MetricsLayer};
pub use operation::DispatchRequest;
pub use registry::{RouterBinding, RouterRegistry};
pub use resolver::IdentifierResolver;
pub use router::DispatchService;
pub use worker::{BackgroundRunnable, BackgroundWorker, RegistrationRunnable, RouterEvent};
