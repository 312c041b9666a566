use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::ResourceName;

/// HTTP verb an operation is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unsupported verb.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported method: {0}")]
pub struct UnsupportedMethod(pub String);

impl FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            _ => Err(UnsupportedMethod(s.to_string())),
        }
    }
}

/// Whether an operation acts on the whole collection or on one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Collection,
    Item,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collection => f.write_str("collection"),
            Self::Item => f.write_str("item"),
        }
    }
}

/// A named, verb-tagged action exposed by a resource.
///
/// Operations are what hypermedia representations advertise as affordances.
/// Within one resource and scope, `name` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub method: Method,
    pub scope: Scope,
    pub resource: ResourceName,
}

impl Operation {
    pub fn new(
        resource: ResourceName,
        scope: Scope,
        name: impl Into<String>,
        method: Method,
    ) -> Self {
        Self {
            name: name.into(),
            method,
            scope,
            resource,
        }
    }

    /// Relative URI template of the operation, e.g. `Books/{id}/archive`.
    #[must_use]
    pub fn uri_template(&self) -> String {
        match self.scope {
            Scope::Collection => format!("{}/{}", self.resource, self.name),
            Scope::Item => format!("{}/{{id}}/{}", self.resource, self.name),
        }
    }
}
