//! Mapping of dispatch failures onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hyperroute_core::DispatchError;
use serde_json::json;
use tracing::error;

/// Error returned by the operation handlers.
///
/// Rendered as `{"error": <kind>, "message": <text>}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("request body is not valid JSON: {0}")]
    MalformedBody(#[source] serde_json::Error),
    #[error("method {0} cannot invoke custom operations")]
    UnsupportedMethod(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Dispatch(DispatchError::RouteNotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Dispatch(DispatchError::OperationNotAllowed { .. })
            | Self::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Dispatch(DispatchError::IdentifierMappingFailed { .. })
            | Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Self::Dispatch(DispatchError::HandlerInvocationFailed(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Dispatch(err) => err.kind(),
            Self::MalformedBody(_) => "malformed_body",
            Self::UnsupportedMethod(_) => "unsupported_method",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind(), error = %self, "operation failed");
        }
        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use hyperroute_core::{Method, ResourceName};

    use super::*;

    fn books() -> ResourceName {
        ResourceName::new("Books")
    }

    #[test]
    fn dispatch_failures_map_to_statuses() {
        let cases = [
            (DispatchError::not_found(&books()), StatusCode::NOT_FOUND),
            (
                DispatchError::not_allowed(Method::Post, &books()),
                StatusCode::METHOD_NOT_ALLOWED,
            ),
            (
                DispatchError::IdentifierMappingFailed {
                    resource: books(),
                    raw_id: "abc".to_string(),
                    identifier_type: None,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                DispatchError::HandlerInvocationFailed(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[tokio::test]
    async fn body_carries_kind_and_message() {
        let response = ApiError::from(DispatchError::not_found(&books())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "route_not_found");
        assert_eq!(body["message"], "no routes registered for resource Books");
    }

    #[test]
    fn malformed_body_is_a_client_error() {
        let err = serde_json::from_slice::<serde_json::Value>(b"{oops").unwrap_err();
        let api = ApiError::MalformedBody(err);
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert_eq!(api.kind(), "malformed_body");
    }
}
