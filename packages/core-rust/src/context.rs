use std::collections::HashMap;

use crate::types::Principal;

/// Per-request context handed to every handler.
///
/// The transport layer builds one of these for each inbound request; the
/// dispatch core only passes it through. Header names are stored lowercased.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Identifier assigned to the request by the transport (e.g. `X-Request-Id`).
    pub request_id: String,
    /// Distributed trace identifier, if the caller propagated one.
    pub trace_id: Option<String>,
    /// Authenticated principal, if the request is authenticated.
    pub principal: Option<Principal>,
    headers: HashMap<String, String>,
}

impl RequestContext {
    /// Creates a context with the given request id and no headers.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert_header(name, value);
        self
    }

    pub fn insert_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}
