//! Failure taxonomy for dispatch (request time) and registration (configuration time).

use crate::operation::{Method, Scope};
use crate::types::ResourceName;

/// Request-time failure returned by every dispatch.
///
/// These are expected outcomes, carried as values through `Result`. The
/// transport maps each variant to a distinct external signal, so
/// `RouteNotFound` and `OperationNotAllowed` must never be conflated.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no routes registered for resource {resource}")]
    RouteNotFound { resource: ResourceName },
    #[error("{method} is not allowed on resource {resource}")]
    OperationNotAllowed {
        method: Method,
        resource: ResourceName,
    },
    #[error(
        "cannot map id {raw_id:?} of resource {resource} to identifier type {}",
        .identifier_type.unwrap_or("<unregistered>")
    )]
    IdentifierMappingFailed {
        resource: ResourceName,
        raw_id: String,
        identifier_type: Option<&'static str>,
    },
    #[error("handler invocation failed: {0}")]
    HandlerInvocationFailed(#[from] anyhow::Error),
}

impl DispatchError {
    pub fn not_found(resource: &ResourceName) -> Self {
        Self::RouteNotFound {
            resource: resource.clone(),
        }
    }

    pub fn not_allowed(method: Method, resource: &ResourceName) -> Self {
        Self::OperationNotAllowed {
            method,
            resource: resource.clone(),
        }
    }

    /// Stable, machine-readable name of the failure kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RouteNotFound { .. } => "route_not_found",
            Self::OperationNotAllowed { .. } => "operation_not_allowed",
            Self::IdentifierMappingFailed { .. } => "identifier_mapping_failed",
            Self::HandlerInvocationFailed(_) => "handler_invocation_failed",
        }
    }
}

/// Registration-time failure. Aborts registration of one router only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("router {router} must have a valid generic type: {detail}")]
    MustHaveValidGenericType { router: String, detail: String },
    #[error("no path identifier mapper registered for {identifier_type}")]
    MustHavePathIdentifierMapper { identifier_type: &'static str },
    #[error("resource {resource} is already bound to router {existing}, rejecting router {incoming}")]
    DuplicateResourceName {
        resource: ResourceName,
        existing: String,
        incoming: String,
    },
    #[error("operation {name} is declared twice in the {scope} routes of {resource}")]
    DuplicateOperation {
        resource: ResourceName,
        scope: Scope,
        name: String,
    },
    #[error("no provider registered for {type_name}")]
    MustHaveProvider { type_name: &'static str },
}
