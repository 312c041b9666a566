use std::any::Any;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use hyperroute_core::{ProviderManager, RequestContext, TypeTag};

type ProviderFn =
    Arc<dyn Fn(&RequestContext) -> Option<Arc<dyn Any + Send + Sync>> + Send + Sync>;

/// Request-scoped dependency factories keyed by the provided type.
#[derive(Default)]
pub struct Providers {
    factories: DashMap<TypeTag, ProviderFn>,
}

impl Providers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provides `A` by calling `factory` with each request's context.
    pub fn register_with<A, F>(&self, factory: F)
    where
        A: Send + Sync + 'static,
        F: Fn(&RequestContext) -> Option<A> + Send + Sync + 'static,
    {
        let factory: ProviderFn = Arc::new(move |ctx: &RequestContext| {
            factory(ctx).map(|value| Arc::new(value) as Arc<dyn Any + Send + Sync>)
        });
        self.factories.insert(TypeTag::of::<A>(), factory);
    }

    /// Provides the same `value` to every request.
    pub fn register_value<A>(&self, value: A)
    where
        A: Clone + Send + Sync + 'static,
    {
        self.register_with::<A, _>(move |_ctx| Some(value.clone()));
    }
}

impl ProviderManager for Providers {
    fn provide(
        &self,
        type_tag: TypeTag,
        ctx: &RequestContext,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        let factory = self.factories.get(&type_tag)?.value().clone();
        factory(ctx)
    }
}

impl fmt::Debug for Providers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<&'static str> = self.factories.iter().map(|e| e.key().name()).collect();
        f.debug_struct("Providers").field("types", &types).finish()
    }
}
