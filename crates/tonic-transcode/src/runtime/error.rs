//! Transcoding errors and their HTTP rendering.

use axum::extract::Json;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;

use super::headers::metadata_to_headers;
use super::status_map::{grpc_code_name, grpc_to_http_status};
use crate::access::FieldResolutionError;
use crate::route::RpcKind;

/// Everything that can go wrong while serving one transcoded request.
///
/// Every variant renders as a single HTTP response following the
/// [Google API error model](https://cloud.google.com/apis/design/errors):
///
/// ```json
/// { "error": { "code": 400, "message": "...", "status": "INVALID_ARGUMENT" } }
/// ```
///
/// Errors detected while building the request message short-circuit before
/// any RPC is issued. [`TranscodeError::Upstream`] carries the failed call's
/// status; its metadata (trailers) is copied onto the response headers.
///
/// # Examples
///
/// ```
/// use tonic_transcode::TranscodeError;
/// use axum::response::IntoResponse;
///
/// let err = TranscodeError::from(tonic::Status::not_found("user not found"));
/// let response = err.into_response();
/// assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
/// ```
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TranscodeError {
    /// No route matches the request.
    #[error("no route for {method} {path}")]
    RouteNotFound {
        /// Request verb.
        method: Method,
        /// Request path.
        path: String,
    },

    /// A server-streaming route was called with a verb other than `GET`.
    #[error("{method} is not allowed for server-streaming method {rpc}")]
    MethodNotAllowed {
        /// Request verb.
        method: Method,
        /// Fully-qualified RPC method name.
        rpc: String,
    },

    /// The route points at a client-streaming or bidirectional method.
    #[error("{rpc} is a {kind} method, which cannot be transcoded")]
    UnsupportedMethodType {
        /// Fully-qualified RPC method name.
        rpc: String,
        /// Kind of the method.
        kind: RpcKind,
    },

    /// The body is not valid JSON for the targeted message, or the body
    /// selector names a field that cannot receive it.
    #[error("invalid request body: {0}")]
    BodyParse(String),

    /// A path variable or query parameter could not be converted to its field type.
    #[error(transparent)]
    FieldResolution(#[from] FieldResolutionError),

    /// The rendered content type matches none of the `Accept` entries.
    #[error("response type {content_type} is not acceptable")]
    NotAcceptable {
        /// Content type the gateway would have produced.
        content_type: String,
    },

    /// The upstream call failed.
    #[error("{}: {}", grpc_code_name(.0.code()), .0.message())]
    Upstream(tonic::Status),

    /// The gateway itself failed, e.g. an upstream reply that does not decode.
    #[error("{0}")]
    Internal(String),
}

impl TranscodeError {
    /// gRPC code reported in the `status` field of the error body.
    #[must_use]
    pub fn grpc_code(&self) -> tonic::Code {
        match self {
            Self::RouteNotFound { .. } => tonic::Code::NotFound,
            Self::MethodNotAllowed { .. } => tonic::Code::Unimplemented,
            Self::UnsupportedMethodType { .. } | Self::Internal(_) => tonic::Code::Internal,
            Self::BodyParse(_) | Self::FieldResolution(_) | Self::NotAcceptable { .. } => {
                tonic::Code::InvalidArgument
            }
            Self::Upstream(status) => status.code(),
        }
    }

    /// HTTP status of the rendered response.
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            Self::UnsupportedMethodType { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            other => grpc_to_http_status(other.grpc_code()),
        }
    }

    /// Human-readable message placed in the error body.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Upstream(status) => status.message().to_string(),
            other => other.to_string(),
        }
    }

    /// Convert into a [`tonic::Status`], keeping an upstream status as is.
    #[must_use]
    pub fn into_status(self) -> tonic::Status {
        match self {
            Self::Upstream(status) => status,
            other => tonic::Status::new(other.grpc_code(), other.to_string()),
        }
    }

    /// The `{code, message, status}` object that describes this error.
    ///
    /// HTTP error responses wrap it in `{"error": ...}`; SSE error events
    /// carry it bare.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.http_status().as_u16(),
            "message": self.message(),
            "status": grpc_code_name(self.grpc_code()),
        })
    }
}

impl From<tonic::Status> for TranscodeError {
    fn from(status: tonic::Status) -> Self {
        Self::Upstream(status)
    }
}

impl IntoResponse for TranscodeError {
    fn into_response(self) -> axum::response::Response {
        let http_status = self.http_status();
        let body = serde_json::json!({ "error": self.to_json() });

        match &self {
            Self::Upstream(status) => {
                let headers = metadata_to_headers(status.metadata());
                (http_status, headers, Json(body)).into_response()
            }
            _ => (http_status, Json(body)).into_response(),
        }
    }
}
