//! The router contract and its type-erased registration descriptor.

use std::fmt;
use std::sync::Arc;

use crate::error::ConfigurationError;
use crate::identifier::Identifier;
use crate::operation::Operation;
use crate::routes::{
    CollectionRoutes, CollectionRoutesBuilder, ItemRoutes, ItemRoutesBuilder, RouteBuildContext,
};
use crate::types::TypeTag;

/// Contributes the routes of one resource type.
///
/// `Model` and `Identifier` stand in for the generic parameters a router
/// declares; the registry reads them to find the resource name and to bind
/// the identifier mapper. Returning `None` from a method means the resource
/// has no routes in that scope.
pub trait Router: Send + Sync + 'static {
    type Model: Send + Sync + 'static;
    type Identifier: Identifier;

    fn collection_routes(
        &self,
        builder: CollectionRoutesBuilder<Self::Model>,
    ) -> Option<CollectionRoutesBuilder<Self::Model>> {
        let _ = builder;
        None
    }

    fn item_routes(
        &self,
        builder: ItemRoutesBuilder<Self::Model, Self::Identifier>,
    ) -> Option<ItemRoutesBuilder<Self::Model, Self::Identifier>> {
        let _ = builder;
        None
    }
}

/// Route tables a router produced for one resource.
#[derive(Debug, Default)]
pub struct ResourceRoutes {
    pub collection: Option<CollectionRoutes>,
    pub item: Option<ItemRoutes>,
}

impl ResourceRoutes {
    /// Collection operations followed by item operations, each in
    /// declaration order.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        let collection = self.collection.iter().flat_map(CollectionRoutes::operations);
        let item = self.item.iter().flat_map(ItemRoutes::operations);
        collection.chain(item).cloned().collect()
    }
}

type BuildFn =
    Arc<dyn Fn(&RouteBuildContext) -> Result<ResourceRoutes, ConfigurationError> + Send + Sync>;

/// Explicit registration unit for one router.
///
/// `key` identifies the contributing plugin across register, update and
/// unregister events. Types come from the router's associated types, or
/// from explicit overrides for descriptors assembled by hand.
#[derive(Clone)]
pub struct RouterDescriptor {
    key: String,
    declared_model_type: Option<TypeTag>,
    model_type_override: Option<TypeTag>,
    identifier_type: Option<TypeTag>,
    build: BuildFn,
}

impl RouterDescriptor {
    /// Describes a typed router.
    pub fn from_router<R: Router>(key: impl Into<String>, router: R) -> Self {
        let router = Arc::new(router);
        let build: BuildFn = Arc::new(
            move |ctx: &RouteBuildContext| -> Result<ResourceRoutes, ConfigurationError> {
                let collection = router
                    .collection_routes(CollectionRoutesBuilder::new(ctx.clone()))
                    .map(CollectionRoutesBuilder::build)
                    .transpose()?;
                let item = router
                    .item_routes(ItemRoutesBuilder::new(ctx.clone()))
                    .map(ItemRoutesBuilder::build)
                    .transpose()?;
                Ok(ResourceRoutes { collection, item })
            },
        );
        Self {
            key: key.into(),
            declared_model_type: Some(TypeTag::of::<R::Model>()),
            model_type_override: None,
            identifier_type: Some(TypeTag::of::<R::Identifier>()),
            build,
        }
    }

    /// Describes a router by its build function alone. Model and identifier
    /// types must then be supplied with [`with_model_type`](Self::with_model_type)
    /// and [`with_identifier_type`](Self::with_identifier_type).
    pub fn new<F>(key: impl Into<String>, build: F) -> Self
    where
        F: Fn(&RouteBuildContext) -> Result<ResourceRoutes, ConfigurationError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            key: key.into(),
            declared_model_type: None,
            model_type_override: None,
            identifier_type: None,
            build: Arc::new(build),
        }
    }

    /// Explicit model type, taking precedence over the declared one.
    #[must_use]
    pub fn with_model_type(mut self, model_type: TypeTag) -> Self {
        self.model_type_override = Some(model_type);
        self
    }

    #[must_use]
    pub fn with_identifier_type(mut self, identifier_type: TypeTag) -> Self {
        self.identifier_type = Some(identifier_type);
        self
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The model type this router operates on.
    ///
    /// # Errors
    ///
    /// `MustHaveValidGenericType` if no type is known, or if an override
    /// contradicts the router's declared model type.
    pub fn model_type(&self) -> Result<TypeTag, ConfigurationError> {
        match (self.model_type_override, self.declared_model_type) {
            (Some(explicit), Some(declared)) if explicit != declared => {
                Err(ConfigurationError::MustHaveValidGenericType {
                    router: self.key.clone(),
                    detail: format!(
                        "model type override {explicit} does not match declared {declared}"
                    ),
                })
            }
            (Some(tag), _) | (None, Some(tag)) => Ok(tag),
            (None, None) => Err(ConfigurationError::MustHaveValidGenericType {
                router: self.key.clone(),
                detail: "no model type declared".to_string(),
            }),
        }
    }

    /// The identifier marker type this router addresses items by.
    ///
    /// # Errors
    ///
    /// `MustHaveValidGenericType` if none was declared.
    pub fn identifier_type(&self) -> Result<TypeTag, ConfigurationError> {
        self.identifier_type
            .ok_or_else(|| ConfigurationError::MustHaveValidGenericType {
                router: self.key.clone(),
                detail: "no identifier type declared".to_string(),
            })
    }

    /// Runs the router against a bound build context.
    ///
    /// # Errors
    ///
    /// Whatever configuration error the router's tables raise.
    pub fn build(&self, ctx: &RouteBuildContext) -> Result<ResourceRoutes, ConfigurationError> {
        (self.build)(ctx)
    }
}

impl fmt::Debug for RouterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterDescriptor")
            .field("key", &self.key)
            .field("declared_model_type", &self.declared_model_type)
            .field("model_type_override", &self.model_type_override)
            .field("identifier_type", &self.identifier_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::{Path, ResourceIdentifier};
    use crate::operation::{Method, Scope};
    use crate::routes::Affordances;
    use crate::traits::NoProviders;
    use crate::types::ResourceName;

    struct Book;
    struct BookId;
    impl Identifier for BookId {
        type Id = u64;
    }

    struct BookRouter;

    impl Router for BookRouter {
        type Model = Book;
        type Identifier = BookId;

        fn collection_routes(
            &self,
            builder: CollectionRoutesBuilder<Book>,
        ) -> Option<CollectionRoutesBuilder<Book>> {
            Some(builder.add_custom_operation("checkout", Method::Post, |_ctx, _body| {
                Ok::<_, anyhow::Error>(Book)
            }))
        }

        fn item_routes(
            &self,
            builder: ItemRoutesBuilder<Book, BookId>,
        ) -> Option<ItemRoutesBuilder<Book, BookId>> {
            Some(builder.add_custom_operation("renew", Method::Put, |_ctx, _id, _body| {
                Ok::<_, anyhow::Error>(Book)
            }))
        }
    }

    struct ReadOnlyRouter;

    impl Router for ReadOnlyRouter {
        type Model = Book;
        type Identifier = BookId;
    }

    fn ctx() -> RouteBuildContext {
        RouteBuildContext {
            resource: ResourceName::new("Books"),
            model_type: TypeTag::of::<Book>(),
            identifier_type: TypeTag::of::<BookId>(),
            providers: Arc::new(NoProviders),
            identifier_fn: Arc::new(|_path: &Path| Ok(ResourceIdentifier::new::<BookId>(1))),
            affordances: Arc::new(Affordances::default()),
        }
    }

    #[test]
    fn typed_router_declares_its_types() {
        let descriptor = RouterDescriptor::from_router("books", BookRouter);
        assert_eq!(descriptor.model_type(), Ok(TypeTag::of::<Book>()));
        assert_eq!(descriptor.identifier_type(), Ok(TypeTag::of::<BookId>()));
    }

    #[test]
    fn typed_router_builds_both_scopes() {
        let routes = RouterDescriptor::from_router("books", BookRouter)
            .build(&ctx())
            .unwrap();
        let ops = routes.operations();
        assert_eq!(ops.len(), 2);
        assert_eq!((ops[0].name.as_str(), ops[0].scope), ("checkout", Scope::Collection));
        assert_eq!((ops[1].name.as_str(), ops[1].scope), ("renew", Scope::Item));
    }

    #[test]
    fn router_without_routes_yields_no_tables() {
        let routes = RouterDescriptor::from_router("books", ReadOnlyRouter)
            .build(&ctx())
            .unwrap();
        assert!(routes.collection.is_none());
        assert!(routes.item.is_none());
        assert!(routes.operations().is_empty());
    }

    #[test]
    fn matching_override_is_accepted() {
        let descriptor = RouterDescriptor::from_router("books", BookRouter)
            .with_model_type(TypeTag::of::<Book>());
        assert_eq!(descriptor.model_type(), Ok(TypeTag::of::<Book>()));
    }

    #[test]
    fn conflicting_override_is_rejected() {
        let descriptor = RouterDescriptor::from_router("books", BookRouter)
            .with_model_type(TypeTag::of::<String>());
        assert!(matches!(
            descriptor.model_type(),
            Err(ConfigurationError::MustHaveValidGenericType { ref router, .. }) if router == "books"
        ));
    }

    #[test]
    fn untyped_descriptor_needs_explicit_types() {
        let descriptor = RouterDescriptor::new("raw", |_ctx| Ok(ResourceRoutes::default()));
        assert!(descriptor.model_type().is_err());
        assert!(descriptor.identifier_type().is_err());

        let descriptor = descriptor
            .with_model_type(TypeTag::of::<Book>())
            .with_identifier_type(TypeTag::of::<BookId>());
        assert_eq!(descriptor.model_type(), Ok(TypeTag::of::<Book>()));
        assert_eq!(descriptor.identifier_type(), Ok(TypeTag::of::<BookId>()));
    }
}
