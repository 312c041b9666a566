use std::any::Any;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use hyperroute_core::{Representor, SingleModel, TypeTag};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

type EncodeFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Option<Value> + Send + Sync>;

/// Represents models as JSON through their `Serialize` implementation.
///
/// Only registered model types are represented; anything else yields `None`.
#[derive(Default)]
pub struct JsonRepresentor {
    encoders: DashMap<TypeTag, EncodeFn>,
}

impl JsonRepresentor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Serialize + Send + Sync + 'static>(&self) {
        let encode: EncodeFn = Arc::new(|model: &(dyn Any + Send + Sync)| {
            let model = model.downcast_ref::<T>()?;
            serde_json::to_value(model)
                .map_err(|error| {
                    warn!(model_type = std::any::type_name::<T>(), %error, "model serialization failed");
                })
                .ok()
        });
        self.encoders.insert(TypeTag::of::<T>(), encode);
    }
}

impl Representor for JsonRepresentor {
    fn represent(&self, model: &SingleModel) -> Option<Value> {
        let encode = self.encoders.get(&model.model_type())?.value().clone();
        encode(model.model_any())
    }
}

impl fmt::Debug for JsonRepresentor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<&'static str> = self.encoders.iter().map(|e| e.key().name()).collect();
        f.debug_struct("JsonRepresentor").field("model_types", &types).finish()
    }
}

#[cfg(test)]
mod tests {
    use hyperroute_core::ResourceName;
    use serde_json::json;

    use super::*;

    #[derive(Serialize)]
    struct Book {
        id: u64,
        title: String,
    }

    #[test]
    fn registered_model_is_serialized() {
        let representor = JsonRepresentor::new();
        representor.register::<Book>();

        let model = SingleModel::new(
            Book {
                id: 7,
                title: "Dune".to_string(),
            },
            ResourceName::new("Books"),
            Vec::new(),
        );
        assert_eq!(representor.represent(&model), Some(json!({"id": 7, "title": "Dune"})));
    }

    #[test]
    fn unregistered_model_is_not_represented() {
        let representor = JsonRepresentor::new();
        let model = SingleModel::new(3_u32, ResourceName::new("Counters"), Vec::new());
        assert_eq!(representor.represent(&model), None);
    }
}
