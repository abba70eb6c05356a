//! HTTP-facing runtime pieces shared by the dispatcher:
//! - [`TranscodeError`]: error taxonomy rendered as Google-style JSON errors
//! - [`build_rpc_request`] / [`metadata_to_headers`]: header and metadata bridging
//! - [`sse_message_event`] / [`sse_error_event`]: server-streaming events
//! - [`grpc_to_http_status`]: gRPC to HTTP status mapping

mod error;
mod headers;
mod sse;
mod status_map;

pub use error::TranscodeError;
pub use headers::{build_rpc_request, metadata_to_headers, FORWARDED_HEADERS};
pub use sse::{sse_error_event, sse_message_event};
pub use status_map::{grpc_code_name, grpc_to_http_status, http_status_for_raw_code};
