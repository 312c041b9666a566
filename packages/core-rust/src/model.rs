//! Request bodies and resolved resource models.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::operation::Operation;
use crate::types::{ResourceName, TypeTag};

/// Opaque request payload.
///
/// The transport decodes the wire body into a JSON value; handlers read
/// fields out of it. An empty body is distinct from a JSON `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    value: Option<Value>,
}

impl Body {
    #[must_use]
    pub fn empty() -> Self {
        Self { value: None }
    }

    #[must_use]
    pub fn json(value: Value) -> Self {
        Self { value: Some(value) }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Top-level field of a JSON object body.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.value.as_ref().and_then(|v| v.get(key))
    }

    #[must_use]
    pub fn string(&self, key: &str) -> Option<&str> {
        self.value(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn integer(&self, key: &str) -> Option<i64> {
        self.value(key).and_then(Value::as_i64)
    }

    #[must_use]
    pub fn boolean(&self, key: &str) -> Option<bool> {
        self.value(key).and_then(Value::as_bool)
    }

    /// Elements of a batch body (a JSON array), each as its own `Body`.
    /// A non-array body yields itself as a single element.
    #[must_use]
    pub fn as_list(&self) -> Vec<Body> {
        match &self.value {
            Some(Value::Array(items)) => items.iter().cloned().map(Body::json).collect(),
            Some(_) => vec![self.clone()],
            None => Vec::new(),
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    #[must_use]
    pub fn into_json(self) -> Option<Value> {
        self.value
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Self::json(value)
    }
}

/// A single resolved resource: the model a handler produced, tagged with its
/// type and resource, plus the operations the resource exposes.
#[derive(Clone)]
pub struct SingleModel {
    model: Arc<dyn Any + Send + Sync>,
    model_type: TypeTag,
    resource_name: ResourceName,
    operations: Vec<Operation>,
}

impl SingleModel {
    pub fn new<T: Send + Sync + 'static>(
        model: T,
        resource_name: ResourceName,
        operations: Vec<Operation>,
    ) -> Self {
        Self {
            model: Arc::new(model),
            model_type: TypeTag::of::<T>(),
            resource_name,
            operations,
        }
    }

    #[must_use]
    pub fn model<T: 'static>(&self) -> Option<&T> {
        self.model.downcast_ref::<T>()
    }

    /// The model as an untyped `Any`, for representors keyed by type.
    #[must_use]
    pub fn model_any(&self) -> &(dyn Any + Send + Sync) {
        &*self.model
    }

    #[must_use]
    pub fn model_type(&self) -> TypeTag {
        self.model_type
    }

    #[must_use]
    pub fn resource_name(&self) -> &ResourceName {
        &self.resource_name
    }

    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }
}

impl fmt::Debug for SingleModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleModel")
            .field("resource_name", &self.resource_name)
            .field("model_type", &self.model_type)
            .field("operations", &self.operations.len())
            .finish_non_exhaustive()
    }
}
