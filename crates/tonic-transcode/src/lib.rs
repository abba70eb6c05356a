//! HTTP/JSON to gRPC transcoding for Tonic channels.
//!
//! A [`Gateway`] reads a serialized `FileDescriptorSet`, derives one route
//! per `google.api.http` binding (plus a default route for unannotated
//! methods) and serves them over axum. Each request is turned into a dynamic
//! protobuf message, sent upstream through an [`RpcChannel`], and the reply
//! is rendered back as proto3 JSON. Server-streaming methods answer with
//! Server-Sent Events.
//!
//! # Types
//!
//! - [`Gateway`] / [`GatewayBuilder`]: the dispatcher and its configuration
//! - [`RouteTable`] / [`RouteRule`]: routes derived from descriptors
//! - [`build_request`] / [`project`]: request and response transcoding
//! - [`TranscodeError`]: failures rendered as Google-style JSON errors
//! - [`grpc_to_http_status`]: gRPC to HTTP status mapping
//!
//! # Usage
//!
//! ```ignore
//! use tonic_transcode::Gateway;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let descriptors = std::fs::read("descriptors.bin")?;
//! let channel = tonic::transport::Channel::from_static("http://[::1]:50051").connect_lazy();
//! let router = Gateway::builder(descriptors).build(channel)?.into_router();
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Path variables take precedence over the body, which takes precedence over
//! query parameters: `POST /v1/users/1?name=query&id=2` with body
//! `{"name": "body", "id": "3"}` sends `name = "body"` and `id = "1"`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod access;
mod channel;
mod config;
mod gateway;
mod negotiate;
mod project;
mod route;
mod runtime;
mod transcode;

#[cfg(test)]
mod testing;

pub use access::{FieldAccess, FieldAccessError, FieldResolutionError};
pub use channel::{method_path, CancelHandle, DynamicCodec, RpcChannel, ServerStreamingCall};
pub use config::{JsonOptions, TranscodingConfig, DEFAULT_MAX_BODY_BYTES, DEFAULT_SSE_KEEP_ALIVE_SECS};
pub use gateway::{Gateway, GatewayBuilder};
pub use negotiate::{is_acceptable, parse_accept, MediaRange};
pub use project::{project, RenderedBody, JSON_CONTENT_TYPE, TEXT_CONTENT_TYPE};
pub use route::{
    http_rules_by_method, BodySelector, PathTemplate, PathVariables, RouteError, RouteMatch,
    RouteRule, RouteTable, RpcKind, TemplateError,
};
pub use runtime::*;
pub use transcode::{build_request, parse_json, parse_query, QueryParams, RequestVariable};

#[doc(hidden)]
pub use channel::{DynamicDecoder, DynamicEncoder};
