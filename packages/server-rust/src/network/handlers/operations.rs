//! Custom-operation endpoints.
//!
//! - `/api/{resource}/{operation}` dispatches a collection operation
//! - `/api/{resource}/{id}/{operation}` dispatches an item operation
//! - `GET /api/{resource}` lists the resource's operations
//!
//! The HTTP verb selects among same-named operations, so both dispatch
//! routes accept any method and leave the decision to the dispatcher.

use axum::extract::{Path, State};
use axum::http::{self, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use hyperroute_core::{Body, DispatchError, Method, RequestContext, ResourceName};
use serde_json::json;
use tower::ServiceExt;
use tracing::warn;

use super::{ApiError, AppState};
use crate::network::middleware::REQUEST_ID_HEADER;
use crate::service::DispatchRequest;

const TRACE_HEADER: &str = "traceparent";

pub async fn collection_operation_handler(
    State(state): State<AppState>,
    method: http::Method,
    Path((resource, operation)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = DispatchRequest::collection(
        request_context(&headers),
        resource,
        operation,
        dispatch_method(&method)?,
        decode_body(&body)?,
    );
    dispatch(state, request).await
}

pub async fn item_operation_handler(
    State(state): State<AppState>,
    method: http::Method,
    Path((resource, id, operation)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = DispatchRequest::item(
        request_context(&headers),
        resource,
        id,
        operation,
        dispatch_method(&method)?,
        decode_body(&body)?,
    );
    dispatch(state, request).await
}

/// Affordances of one resource: collection operations, then item operations.
pub async fn list_operations_handler(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let binding = state
        .dispatcher
        .registry()
        .binding(&resource)
        .ok_or_else(|| DispatchError::not_found(&ResourceName::new(&resource)))?;

    Ok(Json(json!({
        "resource": binding.resource(),
        "operations": binding.operations(),
    })))
}

async fn dispatch(state: AppState, request: DispatchRequest) -> Result<Response, ApiError> {
    let method = request.method;
    // Keeps shutdown draining until the blocking handler finishes, past any
    // transport timeout.
    let request = request.with_lease(state.shutdown.in_flight_guard());
    let model = state.pipeline.oneshot(request).await?;

    if method == Method::Delete {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let representation = state.representor.represent(&model);
    if representation.is_none() {
        warn!(
            resource = %model.resource_name(),
            model_type = %model.model_type(),
            "no representation for model"
        );
    }

    Ok(Json(json!({
        "resource": model.resource_name(),
        "model": representation,
        "operations": model.operations(),
    }))
    .into_response())
}

fn dispatch_method(method: &http::Method) -> Result<Method, ApiError> {
    method
        .as_str()
        .parse()
        .map_err(|_| ApiError::UnsupportedMethod(method.to_string()))
}

fn decode_body(bytes: &Bytes) -> Result<Body, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Body::empty());
    }
    serde_json::from_slice::<serde_json::Value>(bytes)
        .map(Body::json)
        .map_err(ApiError::MalformedBody)
}

fn request_context(headers: &HeaderMap) -> RequestContext {
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string);

    let mut ctx = RequestContext::new(request_id);
    if let Some(trace) = headers.get(TRACE_HEADER).and_then(|v| v.to_str().ok()) {
        ctx = ctx.with_trace_id(trace);
    }
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            ctx.insert_header(name.as_str(), value);
        }
    }
    ctx
}
