//! Operation dispatcher: the request-facing side of the router registry.
//!
//! Every dispatch takes one binding snapshot and runs each step against it:
//! table lookup, route lookup by name and method, identifier resolution
//! (item scope), handler invocation. The first failing step ends the request.

use std::sync::Arc;

use hyperroute_core::{
    Body, DispatchError, Method, Operation, RequestContext, ResourceName, Route, RouteTable,
    SingleModel,
};
use tracing::debug;

use super::operation::DispatchRequest;
use super::registry::RouterRegistry;
use super::resolver::IdentifierResolver;

/// Dispatches custom operations to the handlers of registered routers.
#[derive(Debug, Clone)]
pub struct OperationDispatcher {
    registry: Arc<RouterRegistry>,
}

impl OperationDispatcher {
    pub fn new(registry: Arc<RouterRegistry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<RouterRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn resolver(&self) -> IdentifierResolver {
        IdentifierResolver::new(Arc::clone(&self.registry))
    }

    /// Runs a collection-scoped custom operation.
    ///
    /// # Errors
    ///
    /// - `RouteNotFound` if `resource` has no collection routes.
    /// - `OperationNotAllowed` if no route is named `operation` for `method`.
    /// - Whatever the handler returns.
    pub fn dispatch_collection_operation(
        &self,
        ctx: &RequestContext,
        resource: &str,
        operation: &str,
        method: Method,
        body: Body,
    ) -> Result<SingleModel, DispatchError> {
        let binding = self
            .registry
            .binding(resource)
            .ok_or_else(|| DispatchError::not_found(&ResourceName::new(resource)))?;
        let table = binding
            .collection()
            .ok_or_else(|| DispatchError::not_found(binding.resource()))?;
        let route = find_route(table, operation, method)
            .ok_or_else(|| DispatchError::not_allowed(method, binding.resource()))?;

        debug!(
            request_id = %ctx.request_id,
            resource,
            operation,
            %method,
            version = binding.version(),
            "invoking collection operation"
        );
        (route.handler())(ctx, body)
    }

    /// Runs an item-scoped custom operation on the item addressed by `id`.
    ///
    /// # Errors
    ///
    /// - `OperationNotAllowed` if `resource` has no item routes, or no route
    ///   is named `operation` for `method`.
    /// - `IdentifierMappingFailed` if `id` cannot be mapped.
    /// - Whatever the handler returns.
    pub fn dispatch_item_operation(
        &self,
        ctx: &RequestContext,
        resource: &str,
        operation: &str,
        id: &str,
        method: Method,
        body: Body,
    ) -> Result<SingleModel, DispatchError> {
        let binding = self
            .registry
            .binding(resource)
            .ok_or_else(|| DispatchError::not_allowed(method, &ResourceName::new(resource)))?;
        let table = binding
            .item()
            .ok_or_else(|| DispatchError::not_allowed(method, binding.resource()))?;
        let route = find_route(table, operation, method)
            .ok_or_else(|| DispatchError::not_allowed(method, binding.resource()))?;
        let identifier = IdentifierResolver::resolve_in(&binding, id)?;

        debug!(
            request_id = %ctx.request_id,
            resource,
            operation,
            id,
            %method,
            version = binding.version(),
            "invoking item operation"
        );
        (route.handler())(ctx, &identifier, body)
    }

    /// Routes a pipeline request to the collection or item shape.
    ///
    /// # Errors
    ///
    /// As for the shape the request selects.
    pub fn dispatch(&self, request: DispatchRequest) -> Result<SingleModel, DispatchError> {
        let DispatchRequest {
            ctx,
            resource,
            operation,
            id,
            method,
            body,
            lease: _lease,
        } = request;
        match id {
            Some(id) => {
                self.dispatch_item_operation(&ctx, &resource, &operation, &id, method, body)
            }
            None => self.dispatch_collection_operation(&ctx, &resource, &operation, method, body),
        }
    }

    /// Operations of `resource`: collection operations, then item
    /// operations. Empty if the resource is not registered.
    #[must_use]
    pub fn operations(&self, resource: &str) -> Vec<Operation> {
        self.registry
            .binding(resource)
            .map(|binding| binding.operations().to_vec())
            .unwrap_or_default()
    }
}

fn find_route<'t, H>(table: &'t RouteTable<H>, name: &str, method: Method) -> Option<&'t Route<H>> {
    table
        .route(name)
        .filter(|route| route.operation().method == method)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use hyperroute_core::{
        CollectionRoutesBuilder, ItemRoutesBuilder, ResourceIdentifier, Router, RouterDescriptor,
        Scope,
    };
    use serde_json::json;

    use super::*;
    use crate::demo::{self, Book, BookId, BookRouter, Library};

    fn dispatcher() -> OperationDispatcher {
        let collaborators = demo::collaborators();
        let registry = Arc::new(RouterRegistry::new(
            collaborators.name_registry(),
            collaborators.identifier_mapper(),
            collaborators.provider_manager(),
        ));
        OperationDispatcher::new(registry)
    }

    fn with_books(library: Library) -> OperationDispatcher {
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(&demo::descriptor(Arc::new(library)))
            .unwrap();
        dispatcher
    }

    fn ctx() -> RequestContext {
        RequestContext::new("req-1")
    }

    /// Item-only router: no collection routes at all.
    struct ItemOnlyRouter;

    impl Router for ItemOnlyRouter {
        type Model = Book;
        type Identifier = BookId;

        fn item_routes(
            &self,
            builder: ItemRoutesBuilder<Book, BookId>,
        ) -> Option<ItemRoutesBuilder<Book, BookId>> {
            Some(builder.add_custom_operation(
                "inspect",
                Method::Get,
                |_ctx: &RequestContext, id: u64, _body: Body| {
                    Ok::<_, anyhow::Error>(Book::new(id, "inspected"))
                },
            ))
        }
    }

    /// Collection-only router.
    struct CollectionOnlyRouter;

    impl Router for CollectionOnlyRouter {
        type Model = Book;
        type Identifier = BookId;

        fn collection_routes(
            &self,
            builder: CollectionRoutesBuilder<Book>,
        ) -> Option<CollectionRoutesBuilder<Book>> {
            Some(builder.add_custom_operation(
                "count",
                Method::Get,
                |_ctx: &RequestContext, _body: Body| Ok::<_, anyhow::Error>(Book::new(0, "count")),
            ))
        }
    }

    /// Tags every model with `generation` in both scopes.
    struct GenerationRouter {
        generation: u64,
    }

    impl Router for GenerationRouter {
        type Model = Book;
        type Identifier = BookId;

        fn collection_routes(
            &self,
            builder: CollectionRoutesBuilder<Book>,
        ) -> Option<CollectionRoutesBuilder<Book>> {
            let generation = self.generation;
            Some(builder.add_custom_operation(
                "stamp",
                Method::Get,
                move |_ctx: &RequestContext, _body: Body| {
                    Ok::<_, anyhow::Error>(Book::new(generation, "stamp"))
                },
            ))
        }

        fn item_routes(
            &self,
            builder: ItemRoutesBuilder<Book, BookId>,
        ) -> Option<ItemRoutesBuilder<Book, BookId>> {
            let generation = self.generation;
            Some(builder.add_custom_operation(
                "stamp",
                Method::Get,
                move |_ctx: &RequestContext, _id: u64, _body: Body| {
                    Ok::<_, anyhow::Error>(Book::new(generation, "stamp"))
                },
            ))
        }
    }

    // -- collection scope --------------------------------------------------

    #[test]
    fn collection_operation_invokes_its_handler() {
        let dispatcher = with_books(Library::seeded());
        let model = dispatcher
            .dispatch_collection_operation(
                &ctx(),
                "Books",
                "checkout",
                Method::Post,
                Body::json(json!({"title": "Solaris"})),
            )
            .unwrap();

        let book = model.model::<Book>().unwrap();
        assert_eq!(book.id, 2);
        assert!(book.checked_out);
        assert_eq!(model.resource_name(), &ResourceName::new("Books"));
        assert_eq!(model.operations(), dispatcher.operations("Books").as_slice());
    }

    #[test]
    fn collection_handler_failure_is_returned_unchanged() {
        let dispatcher = with_books(Library::seeded());
        let err = dispatcher
            .dispatch_collection_operation(&ctx(), "Books", "checkout", Method::Post, Body::empty())
            .unwrap_err();
        assert!(matches!(err, DispatchError::HandlerInvocationFailed(_)));
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn unregistered_collection_is_route_not_found() {
        let err = dispatcher()
            .dispatch_collection_operation(&ctx(), "Books", "checkout", Method::Post, Body::empty())
            .unwrap_err();
        assert!(
            matches!(err, DispatchError::RouteNotFound { ref resource } if *resource == "Books")
        );
    }

    #[test]
    fn resource_without_collection_routes_is_route_not_found() {
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(&RouterDescriptor::from_router("items", ItemOnlyRouter))
            .unwrap();
        let err = dispatcher
            .dispatch_collection_operation(&ctx(), "Books", "inspect", Method::Get, Body::empty())
            .unwrap_err();
        assert!(matches!(err, DispatchError::RouteNotFound { .. }));
    }

    #[test]
    fn unknown_collection_operation_is_not_allowed() {
        let err = with_books(Library::seeded())
            .dispatch_collection_operation(&ctx(), "Books", "burn", Method::Post, Body::empty())
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::OperationNotAllowed { method: Method::Post, ref resource } if *resource == "Books"
        ));
    }

    #[test]
    fn collection_method_mismatch_is_not_allowed() {
        let err = with_books(Library::seeded())
            .dispatch_collection_operation(&ctx(), "Books", "checkout", Method::Get, Body::empty())
            .unwrap_err();
        assert!(matches!(err, DispatchError::OperationNotAllowed { method: Method::Get, .. }));
    }

    // -- item scope --------------------------------------------------------

    #[test]
    fn item_operation_receives_typed_identifier() {
        let library = Arc::new(Library::seeded());
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(&demo::descriptor(Arc::clone(&library)))
            .unwrap();

        let model = dispatcher
            .dispatch_item_operation(&ctx(), "Books", "renew", "3", Method::Put, Body::empty())
            .unwrap();
        assert_eq!(model.model::<Book>().unwrap().due_in_days, Some(14));
        assert_eq!(library.get(3).unwrap().due_in_days, Some(14));
    }

    #[test]
    fn unregistered_item_is_not_allowed() {
        let err = dispatcher()
            .dispatch_item_operation(&ctx(), "Books", "archive", "1", Method::Get, Body::empty())
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::OperationNotAllowed { method: Method::Get, ref resource } if *resource == "Books"
        ));
    }

    #[test]
    fn resource_without_item_routes_is_not_allowed() {
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(&RouterDescriptor::from_router("counts", CollectionOnlyRouter))
            .unwrap();
        let err = dispatcher
            .dispatch_item_operation(&ctx(), "Books", "count", "1", Method::Get, Body::empty())
            .unwrap_err();
        assert!(matches!(err, DispatchError::OperationNotAllowed { .. }));
    }

    #[test]
    fn item_route_is_checked_before_the_identifier() {
        let err = with_books(Library::seeded())
            .dispatch_item_operation(&ctx(), "Books", "burn", "abc", Method::Get, Body::empty())
            .unwrap_err();
        assert!(matches!(err, DispatchError::OperationNotAllowed { .. }));
    }

    #[test]
    fn handler_error_for_missing_item_is_invocation_failure() {
        let err = with_books(Library::seeded())
            .dispatch_item_operation(&ctx(), "Books", "archive", "99", Method::Get, Body::empty())
            .unwrap_err();
        assert!(matches!(err, DispatchError::HandlerInvocationFailed(_)));
    }

    // -- scenarios ---------------------------------------------------------

    #[test]
    fn scenario_a_checkout_returns_handler_result() {
        let dispatcher = with_books(Library::seeded());
        let model = dispatcher
            .dispatch_collection_operation(
                &ctx(),
                "Books",
                "checkout",
                Method::Post,
                Body::json(json!({"title": "Dune"})),
            )
            .unwrap();
        assert_eq!(model.model::<Book>().unwrap().title, "Dune");
    }

    #[test]
    fn scenario_b_archive_by_delete_is_not_allowed() {
        let err = with_books(Library::seeded())
            .dispatch_item_operation(
                &ctx(),
                "Books",
                "archive",
                "42",
                Method::Delete,
                Body::empty(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::OperationNotAllowed { method: Method::Delete, ref resource } if *resource == "Books"
        ));
    }

    #[test]
    fn scenario_c_unregistered_books_is_route_not_found() {
        let err = dispatcher()
            .dispatch_collection_operation(&ctx(), "Books", "checkout", Method::Post, Body::empty())
            .unwrap_err();
        assert_eq!(err.kind(), "route_not_found");
    }

    #[test]
    fn scenario_d_non_numeric_id_fails_mapping() {
        let err = with_books(Library::seeded())
            .dispatch_item_operation(&ctx(), "Books", "archive", "abc", Method::Get, Body::empty())
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::IdentifierMappingFailed { ref raw_id, .. } if raw_id == "abc"
        ));
    }

    // -- request routing and affordances -----------------------------------

    #[test]
    fn dispatch_selects_shape_from_the_id() {
        let dispatcher = with_books(Library::seeded());
        let collection = DispatchRequest::collection(
            ctx(),
            "Books",
            "checkout",
            Method::Post,
            Body::json(json!({"title": "Hyperion"})),
        );
        let item =
            DispatchRequest::item(ctx(), "Books", "1", "archive", Method::Get, Body::empty());

        assert_eq!(dispatcher.dispatch(collection).unwrap().model::<Book>().unwrap().id, 3);
        assert!(dispatcher.dispatch(item).unwrap().model::<Book>().unwrap().archived);
    }

    #[test]
    fn operations_list_collection_then_item_in_order() {
        let dispatcher = with_books(Library::seeded());
        let listed: Vec<(String, Method, Scope)> = dispatcher
            .operations("Books")
            .into_iter()
            .map(|op| (op.name, op.method, op.scope))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("checkout".to_string(), Method::Post, Scope::Collection),
                ("archive".to_string(), Method::Get, Scope::Item),
                ("renew".to_string(), Method::Put, Scope::Item),
                ("return".to_string(), Method::Delete, Scope::Item),
            ]
        );
        assert!(dispatcher.operations("Authors").is_empty());
    }

    #[test]
    fn re_registration_does_not_duplicate_operations() {
        let dispatcher = with_books(Library::seeded());
        let before = dispatcher.operations("Books");
        dispatcher
            .registry()
            .register(&RouterDescriptor::from_router(demo::BOOKS_KEY, BookRouter::default()))
            .unwrap();
        assert_eq!(dispatcher.operations("Books"), before);
    }

    #[test]
    fn unregistered_after_unregister_event() {
        let dispatcher = with_books(Library::seeded());
        dispatcher.registry().unregister(demo::BOOKS_KEY);
        let err = dispatcher
            .dispatch_collection_operation(&ctx(), "Books", "checkout", Method::Post, Body::empty())
            .unwrap_err();
        assert!(matches!(err, DispatchError::RouteNotFound { .. }));
    }

    #[test]
    fn identifier_handed_to_handler_matches_resolver() {
        let dispatcher = with_books(Library::seeded());
        let resolved = dispatcher.resolver().resolve("Books", "2").unwrap();
        assert_eq!(resolved, ResourceIdentifier::new::<BookId>(2));
    }

    // -- concurrency -------------------------------------------------------

    #[test]
    fn concurrent_replacement_never_mixes_generations() {
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(&RouterDescriptor::from_router("gen", GenerationRouter { generation: 0 }))
            .unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let writer = {
            let registry = Arc::clone(dispatcher.registry());
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for generation in 1..=200 {
                    registry
                        .update(&RouterDescriptor::from_router(
                            "gen",
                            GenerationRouter { generation },
                        ))
                        .unwrap();
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut last_seen = 0;
                    while !done.load(Ordering::SeqCst) {
                        let binding = dispatcher.registry().binding("Books").unwrap();
                        let collection = binding.collection().unwrap().route("stamp").unwrap();
                        let item = binding.item().unwrap().route("stamp").unwrap();
                        let identifier = ResourceIdentifier::new::<BookId>(1);
                        let from_collection = (collection.handler())(&ctx(), Body::empty())
                            .unwrap()
                            .model::<Book>()
                            .unwrap()
                            .id;
                        let from_item = (item.handler())(&ctx(), &identifier, Body::empty())
                            .unwrap()
                            .model::<Book>()
                            .unwrap()
                            .id;
                        assert_eq!(from_collection, from_item);
                        assert!(from_collection >= last_seen);
                        last_seen = from_collection;
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(dispatcher.registry().binding("Books").unwrap().version(), 201);
    }
}
