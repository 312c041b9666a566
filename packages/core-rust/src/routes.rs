//! Route tables and the builders routers use to declare them.
//!
//! A table maps operation names to handlers for one resource and one scope.
//! Tables are immutable once built; re-registration builds a new one.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use crate::context::RequestContext;
use crate::error::{ConfigurationError, DispatchError};
use crate::identifier::{Identifier, Path, ResourceIdentifier};
use crate::model::{Body, SingleModel};
use crate::operation::{Method, Operation, Scope};
use crate::traits::ProviderManager;
use crate::types::{ResourceName, TypeTag};

// ---------------------------------------------------------------------------
// Handler types
// ---------------------------------------------------------------------------

/// Type-erased collection-scoped handler.
pub type CollectionHandler =
    Arc<dyn Fn(&RequestContext, Body) -> Result<SingleModel, DispatchError> + Send + Sync>;

/// Type-erased item-scoped handler.
pub type ItemHandler = Arc<
    dyn Fn(&RequestContext, &ResourceIdentifier, Body) -> Result<SingleModel, DispatchError>
        + Send
        + Sync,
>;

/// Converts a structural path into the resource's identifier.
pub type IdentifierFunction =
    Arc<dyn Fn(&Path) -> Result<ResourceIdentifier, ConfigurationError> + Send + Sync>;

// ---------------------------------------------------------------------------
// RouteTable
// ---------------------------------------------------------------------------

/// One operation and the handler that serves it.
pub struct Route<H> {
    operation: Operation,
    handler: H,
}

impl<H> Route<H> {
    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }
}

/// Immutable, ordered mapping from operation name to route for one resource
/// and scope.
pub struct RouteTable<H> {
    resource: ResourceName,
    scope: Scope,
    routes: Vec<Route<H>>,
    index: HashMap<String, usize>,
}

pub type CollectionRoutes = RouteTable<CollectionHandler>;
pub type ItemRoutes = RouteTable<ItemHandler>;

impl<H> RouteTable<H> {
    fn build(
        resource: ResourceName,
        scope: Scope,
        routes: Vec<Route<H>>,
    ) -> Result<Self, ConfigurationError> {
        let mut index = HashMap::with_capacity(routes.len());
        for (position, route) in routes.iter().enumerate() {
            if index.insert(route.operation.name.clone(), position).is_some() {
                return Err(ConfigurationError::DuplicateOperation {
                    resource,
                    scope,
                    name: route.operation.name.clone(),
                });
            }
        }
        tracing::debug!(
            resource = %resource,
            %scope,
            operations = routes.len(),
            "route table built"
        );
        Ok(Self {
            resource,
            scope,
            routes,
            index,
        })
    }

    #[must_use]
    pub fn resource(&self) -> &ResourceName {
        &self.resource
    }

    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Route registered under `name`, regardless of method.
    #[must_use]
    pub fn route(&self, name: &str) -> Option<&Route<H>> {
        self.index.get(name).map(|&position| &self.routes[position])
    }

    /// Operations in declaration order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.routes.iter().map(|route| &route.operation)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<H> fmt::Debug for RouteTable<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("resource", &self.resource)
            .field("scope", &self.scope)
            .field(
                "operations",
                &self.routes.iter().map(|r| r.operation.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RouteBuildContext
// ---------------------------------------------------------------------------

/// Operations of a resource, filled once after all its tables are built and
/// attached to every model its handlers return.
#[derive(Debug, Default)]
pub struct Affordances(OnceLock<Vec<Operation>>);

impl Affordances {
    /// Sets the operation list. Later calls are ignored.
    pub fn publish(&self, operations: Vec<Operation>) {
        let _ = self.0.set(operations);
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Operation> {
        self.0.get().cloned().unwrap_or_default()
    }
}

/// Everything a builder is bound to when a router declares its routes.
#[derive(Clone)]
pub struct RouteBuildContext {
    pub resource: ResourceName,
    pub model_type: TypeTag,
    pub identifier_type: TypeTag,
    pub providers: Arc<dyn ProviderManager>,
    pub identifier_fn: IdentifierFunction,
    pub affordances: Arc<Affordances>,
}

impl RouteBuildContext {
    /// Fails unless a builder's model and identifier types are the ones
    /// this context was bound to.
    fn check_types(
        &self,
        model_type: TypeTag,
        identifier_type: Option<TypeTag>,
    ) -> Result<(), ConfigurationError> {
        let mismatch = |what: &str, built: TypeTag, bound: TypeTag| {
            ConfigurationError::MustHaveValidGenericType {
                router: self.resource.to_string(),
                detail: format!("routes built for {what} type {built}, but {bound} is declared"),
            }
        };
        if model_type != self.model_type {
            return Err(mismatch("model", model_type, self.model_type));
        }
        match identifier_type {
            Some(built) if built != self.identifier_type => {
                Err(mismatch("identifier", built, self.identifier_type))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for RouteBuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteBuildContext")
            .field("resource", &self.resource)
            .field("model_type", &self.model_type)
            .field("identifier_type", &self.identifier_type)
            .finish_non_exhaustive()
    }
}

fn provided<A: Clone + 'static>(
    providers: &Arc<dyn ProviderManager>,
    ctx: &RequestContext,
) -> Result<A, ConfigurationError> {
    providers
        .provide_as::<A>(ctx)
        .ok_or(ConfigurationError::MustHaveProvider {
            type_name: std::any::type_name::<A>(),
        })
}

// ---------------------------------------------------------------------------
// CollectionRoutesBuilder
// ---------------------------------------------------------------------------

/// Declares the collection-scoped custom operations of a resource whose
/// handlers produce models of type `T`.
pub struct CollectionRoutesBuilder<T> {
    ctx: RouteBuildContext,
    routes: Vec<Route<CollectionHandler>>,
    _model: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> CollectionRoutesBuilder<T> {
    #[must_use]
    pub fn new(ctx: RouteBuildContext) -> Self {
        Self {
            ctx,
            routes: Vec::new(),
            _model: PhantomData,
        }
    }

    #[must_use]
    pub fn resource_name(&self) -> &ResourceName {
        &self.ctx.resource
    }

    /// Adds a custom operation served by `handler`.
    #[must_use]
    pub fn add_custom_operation<F, E>(mut self, name: &str, method: Method, handler: F) -> Self
    where
        F: Fn(&RequestContext, Body) -> Result<T, E> + Send + Sync + 'static,
        E: Into<anyhow::Error>,
    {
        let resource = self.ctx.resource.clone();
        let affordances = Arc::clone(&self.ctx.affordances);
        let erased: CollectionHandler = Arc::new(
            move |ctx: &RequestContext, body: Body| -> Result<SingleModel, DispatchError> {
                let model = handler(ctx, body)
                    .map_err(|e| DispatchError::HandlerInvocationFailed(e.into()))?;
                Ok(SingleModel::new(model, resource.clone(), affordances.snapshot()))
            },
        );
        self.push(name, method, erased);
        self
    }

    /// Adds a custom operation whose handler also receives a dependency of
    /// type `A` from the provider manager. A missing provider fails the
    /// request with `HandlerInvocationFailed`.
    #[must_use]
    pub fn add_custom_operation_with<A, F, E>(self, name: &str, method: Method, handler: F) -> Self
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(Body, A) -> Result<T, E> + Send + Sync + 'static,
        E: Into<anyhow::Error>,
    {
        let providers = Arc::clone(&self.ctx.providers);
        self.add_custom_operation(
            name,
            method,
            move |ctx: &RequestContext, body: Body| -> anyhow::Result<T> {
                let dependency = provided::<A>(&providers, ctx)?;
                handler(body, dependency).map_err(Into::into)
            },
        )
    }

    fn push(&mut self, name: &str, method: Method, handler: CollectionHandler) {
        let operation = Operation::new(self.ctx.resource.clone(), Scope::Collection, name, method);
        self.routes.push(Route { operation, handler });
    }

    /// Freezes the declared operations into a table.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::DuplicateOperation` if two operations
    /// share a name, or `MustHaveValidGenericType` if `T` is not the model
    /// type the context was bound to.
    pub fn build(self) -> Result<CollectionRoutes, ConfigurationError> {
        self.ctx.check_types(TypeTag::of::<T>(), None)?;
        RouteTable::build(self.ctx.resource, Scope::Collection, self.routes)
    }
}

// ---------------------------------------------------------------------------
// ItemRoutesBuilder
// ---------------------------------------------------------------------------

/// Declares the item-scoped custom operations of a resource whose handlers
/// produce models of type `T` and address items by identifier marker `I`.
pub struct ItemRoutesBuilder<T, I> {
    ctx: RouteBuildContext,
    routes: Vec<Route<ItemHandler>>,
    _marker: PhantomData<fn() -> (T, I)>,
}

impl<T, I> ItemRoutesBuilder<T, I>
where
    T: Send + Sync + 'static,
    I: Identifier,
{
    #[must_use]
    pub fn new(ctx: RouteBuildContext) -> Self {
        Self {
            ctx,
            routes: Vec::new(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn resource_name(&self) -> &ResourceName {
        &self.ctx.resource
    }

    /// Path-to-identifier function bound to this resource's identifier type,
    /// for handlers that need to resolve related paths.
    #[must_use]
    pub fn identifier_function(&self) -> IdentifierFunction {
        Arc::clone(&self.ctx.identifier_fn)
    }

    /// Adds a custom operation served by `handler`, which receives the typed
    /// identifier of the addressed item.
    #[must_use]
    pub fn add_custom_operation<F, E>(mut self, name: &str, method: Method, handler: F) -> Self
    where
        F: Fn(&RequestContext, I::Id, Body) -> Result<T, E> + Send + Sync + 'static,
        E: Into<anyhow::Error>,
    {
        let resource = self.ctx.resource.clone();
        let affordances = Arc::clone(&self.ctx.affordances);
        let erased: ItemHandler = Arc::new(
            move |ctx: &RequestContext,
                  identifier: &ResourceIdentifier,
                  body: Body|
                  -> Result<SingleModel, DispatchError> {
                let id = identifier.value::<I>().cloned().ok_or_else(|| {
                    DispatchError::IdentifierMappingFailed {
                        resource: resource.clone(),
                        raw_id: format!("{identifier:?}"),
                        identifier_type: Some(TypeTag::of::<I>().name()),
                    }
                })?;
                let model = handler(ctx, id, body)
                    .map_err(|e| DispatchError::HandlerInvocationFailed(e.into()))?;
                Ok(SingleModel::new(model, resource.clone(), affordances.snapshot()))
            },
        );
        self.push(name, method, erased);
        self
    }

    /// Item-scoped variant of
    /// [`CollectionRoutesBuilder::add_custom_operation_with`].
    #[must_use]
    pub fn add_custom_operation_with<A, F, E>(self, name: &str, method: Method, handler: F) -> Self
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(I::Id, Body, A) -> Result<T, E> + Send + Sync + 'static,
        E: Into<anyhow::Error>,
    {
        let providers = Arc::clone(&self.ctx.providers);
        self.add_custom_operation(
            name,
            method,
            move |ctx: &RequestContext, id: I::Id, body: Body| -> anyhow::Result<T> {
                let dependency = provided::<A>(&providers, ctx)?;
                handler(id, body, dependency).map_err(Into::into)
            },
        )
    }

    fn push(&mut self, name: &str, method: Method, handler: ItemHandler) {
        let operation = Operation::new(self.ctx.resource.clone(), Scope::Item, name, method);
        self.routes.push(Route { operation, handler });
    }

    /// Freezes the declared operations into a table.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::DuplicateOperation` if two operations
    /// share a name, or `MustHaveValidGenericType` if `T` or `I` differ from
    /// the types the context was bound to.
    pub fn build(self) -> Result<ItemRoutes, ConfigurationError> {
        self.ctx
            .check_types(TypeTag::of::<T>(), Some(TypeTag::of::<I>()))?;
        RouteTable::build(self.ctx.resource, Scope::Item, self.routes)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::traits::NoProviders;

    struct BookId;
    impl Identifier for BookId {
        type Id = u64;
    }

    #[derive(Debug, PartialEq)]
    struct Book {
        id: u64,
        title: String,
    }

    fn build_ctx() -> RouteBuildContext {
        RouteBuildContext {
            resource: ResourceName::new("Books"),
            model_type: TypeTag::of::<Book>(),
            identifier_type: TypeTag::of::<BookId>(),
            providers: Arc::new(NoProviders),
            identifier_fn: Arc::new(|path: &Path| {
                path.id
                    .parse::<u64>()
                    .map(ResourceIdentifier::new::<BookId>)
                    .map_err(|_| ConfigurationError::MustHavePathIdentifierMapper {
                        identifier_type: TypeTag::of::<BookId>().name(),
                    })
            }),
            affordances: Arc::new(Affordances::default()),
        }
    }

    #[test]
    fn collection_handler_wraps_model_with_resource() {
        let table = CollectionRoutesBuilder::<Book>::new(build_ctx())
            .add_custom_operation("checkout", Method::Post, |_ctx, body| {
                Ok::<_, anyhow::Error>(Book {
                    id: 1,
                    title: body.string("title").unwrap_or_default().to_string(),
                })
            })
            .build()
            .unwrap();

        let route = table.route("checkout").unwrap();
        assert_eq!(route.operation().method, Method::Post);
        let model = (route.handler())(
            &RequestContext::new("r"),
            Body::json(json!({"title": "Dune"})),
        )
        .unwrap();
        assert_eq!(model.model::<Book>().unwrap().title, "Dune");
        assert_eq!(model.resource_name(), &ResourceName::new("Books"));
    }

    #[test]
    fn handler_failure_becomes_invocation_failure() {
        let table = CollectionRoutesBuilder::<Book>::new(build_ctx())
            .add_custom_operation("checkout", Method::Post, |_ctx, _body| {
                Err::<Book, _>(anyhow::anyhow!("no copies left"))
            })
            .build()
            .unwrap();
        let handler = table.route("checkout").unwrap().handler();
        let err = handler(&RequestContext::new("r"), Body::empty()).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::HandlerInvocationFailed(ref cause) if cause.to_string() == "no copies left"
        ));
    }

    #[test]
    fn duplicate_operation_name_is_rejected() {
        let err = ItemRoutesBuilder::<Book, BookId>::new(build_ctx())
            .add_custom_operation("archive", Method::Delete, |_ctx, id, _body| {
                Ok::<_, anyhow::Error>(Book { id, title: String::new() })
            })
            .add_custom_operation("archive", Method::Post, |_ctx, id, _body| {
                Ok::<_, anyhow::Error>(Book { id, title: String::new() })
            })
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DuplicateOperation {
                resource: ResourceName::new("Books"),
                scope: Scope::Item,
                name: "archive".to_string(),
            }
        );
    }

    #[test]
    fn same_name_in_different_scopes_is_allowed() {
        let ctx = build_ctx();
        let collection = CollectionRoutesBuilder::<Book>::new(ctx.clone())
            .add_custom_operation("export", Method::Get, |_ctx, _body| {
                Ok::<_, anyhow::Error>(Book { id: 0, title: String::new() })
            })
            .build();
        let item = ItemRoutesBuilder::<Book, BookId>::new(ctx)
            .add_custom_operation("export", Method::Get, |_ctx, id, _body| {
                Ok::<_, anyhow::Error>(Book { id, title: String::new() })
            })
            .build();
        assert!(collection.is_ok());
        assert!(item.is_ok());
    }

    #[test]
    fn item_handler_receives_typed_id() {
        let table = ItemRoutesBuilder::<Book, BookId>::new(build_ctx())
            .add_custom_operation("archive", Method::Delete, |_ctx, id, _body| {
                Ok::<_, anyhow::Error>(Book { id, title: "archived".to_string() })
            })
            .build()
            .unwrap();
        let identifier = ResourceIdentifier::new::<BookId>(42);
        let model = (table.route("archive").unwrap().handler())(
            &RequestContext::new("r"),
            &identifier,
            Body::empty(),
        )
        .unwrap();
        assert_eq!(model.model::<Book>().unwrap().id, 42);
    }

    #[test]
    fn item_handler_rejects_identifier_of_other_type() {
        struct OtherId;
        impl Identifier for OtherId {
            type Id = u64;
        }
        let table = ItemRoutesBuilder::<Book, BookId>::new(build_ctx())
            .add_custom_operation("archive", Method::Delete, |_ctx, id, _body| {
                Ok::<_, anyhow::Error>(Book { id, title: String::new() })
            })
            .build()
            .unwrap();
        let err = (table.route("archive").unwrap().handler())(
            &RequestContext::new("r"),
            &ResourceIdentifier::new::<OtherId>(1),
            Body::empty(),
        )
        .unwrap_err();
        assert!(matches!(err, DispatchError::IdentifierMappingFailed { .. }));
    }

    #[test]
    fn item_builder_for_another_identifier_fails_to_build() {
        struct ShelfId;
        impl Identifier for ShelfId {
            type Id = u64;
        }
        let ctx = RouteBuildContext {
            identifier_type: TypeTag::of::<ShelfId>(),
            ..build_ctx()
        };
        let err = ItemRoutesBuilder::<Book, BookId>::new(ctx)
            .add_custom_operation("inspect", Method::Get, |_ctx, id, _body| {
                Ok::<_, anyhow::Error>(Book { id, title: String::new() })
            })
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MustHaveValidGenericType { ref detail, .. }
                if detail.contains("identifier") && detail.contains("ShelfId")
        ));
    }

    #[test]
    fn collection_builder_for_another_model_fails_to_build() {
        let ctx = RouteBuildContext {
            model_type: TypeTag::of::<String>(),
            ..build_ctx()
        };
        let err = CollectionRoutesBuilder::<Book>::new(ctx).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MustHaveValidGenericType { ref detail, .. } if detail.contains("model")
        ));
    }

    #[test]
    fn missing_provider_fails_the_request() {
        let table = CollectionRoutesBuilder::<Book>::new(build_ctx())
            .add_custom_operation_with::<u32, _, _>("page", Method::Get, |_body, page| {
                Ok::<_, anyhow::Error>(Book { id: u64::from(page), title: String::new() })
            })
            .build()
            .unwrap();
        let err = (table.route("page").unwrap().handler())(&RequestContext::new("r"), Body::empty())
            .unwrap_err();
        let DispatchError::HandlerInvocationFailed(cause) = err else {
            panic!("expected invocation failure");
        };
        assert!(matches!(
            cause.downcast_ref::<ConfigurationError>(),
            Some(ConfigurationError::MustHaveProvider { .. })
        ));
    }

    #[test]
    fn models_carry_published_affordances() {
        let ctx = build_ctx();
        let affordances = Arc::clone(&ctx.affordances);
        let table = CollectionRoutesBuilder::<Book>::new(ctx)
            .add_custom_operation("checkout", Method::Post, |_ctx, _body| {
                Ok::<_, anyhow::Error>(Book { id: 1, title: String::new() })
            })
            .build()
            .unwrap();
        affordances.publish(table.operations().cloned().collect());

        let handler = table.route("checkout").unwrap().handler();
        let model = handler(&RequestContext::new("r"), Body::empty()).unwrap();
        assert_eq!(model.operations().len(), 1);
        assert_eq!(model.operations()[0].name, "checkout");
    }

    #[test]
    fn operations_keep_declaration_order() {
        let table = CollectionRoutesBuilder::<Book>::new(build_ctx())
            .add_custom_operation("b", Method::Get, |_ctx, _body| {
                Ok::<_, anyhow::Error>(Book { id: 0, title: String::new() })
            })
            .add_custom_operation("a", Method::Get, |_ctx, _body| {
                Ok::<_, anyhow::Error>(Book { id: 0, title: String::new() })
            })
            .build()
            .unwrap();
        let names: Vec<_> = table.operations().map(|op| op.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    proptest! {
        #[test]
        fn every_declared_name_is_routable(
            names in proptest::collection::btree_set("[a-z]{1,12}", 1..16)
        ) {
            let builder = names.iter().fold(
                CollectionRoutesBuilder::<Book>::new(build_ctx()),
                |builder, name| {
                    builder.add_custom_operation(name, Method::Post, |_ctx, _body| {
                        Ok::<_, anyhow::Error>(Book { id: 0, title: String::new() })
                    })
                },
            );
            let table = builder.build().unwrap();

            prop_assert_eq!(table.len(), names.len());
            for name in &names {
                let route = table.route(name).unwrap();
                prop_assert_eq!(&route.operation().name, name);
                prop_assert_eq!(route.operation().scope, Scope::Collection);
            }
            let declared: Vec<&String> = table.operations().map(|op| &op.name).collect();
            prop_assert_eq!(declared, names.iter().collect::<Vec<_>>());
        }
    }
}
