//! The dispatcher: route lookup, request transcoding, upstream call and
//! response rendering for one HTTP request.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures::stream::{BoxStream, Stream, StreamExt};
use prost_reflect::{DescriptorPool, DynamicMessage};
use tonic::transport::Channel;
use tonic::Status;

use crate::channel::{CancelHandle, RpcChannel, ServerStreamingCall};
use crate::config::{JsonOptions, TranscodingConfig};
use crate::negotiate::is_acceptable;
use crate::project::project;
use crate::route::{RouteError, RouteRule, RouteTable, RpcKind};
use crate::runtime::{
    build_rpc_request, metadata_to_headers, sse_error_event, sse_message_event, TranscodeError,
};
use crate::transcode::{build_request, RequestVariable};

const EVENT_STREAM: &str = "text/event-stream";

/// Configures and builds a [`Gateway`].
///
/// ```ignore
/// use tonic_transcode::{Gateway, TranscodingConfig};
///
/// # async fn run(descriptors: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
/// let channel = tonic::transport::Channel::from_static("http://[::1]:50051").connect_lazy();
/// let gateway = Gateway::builder(descriptors)
///     .service("demo.UserService")
///     .config(TranscodingConfig::new().native_paths(true))
///     .build(channel)?;
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, gateway.into_router()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GatewayBuilder {
    descriptor_set: Vec<u8>,
    services: Vec<String>,
    config: TranscodingConfig,
}

impl GatewayBuilder {
    /// Start from a serialized, self-contained `FileDescriptorSet`.
    #[must_use]
    pub fn new(descriptor_set: impl Into<Vec<u8>>) -> Self {
        Self {
            descriptor_set: descriptor_set.into(),
            services: Vec::new(),
            config: TranscodingConfig::default(),
        }
    }

    /// Expose one service (`package.Service`). Without any, all services are exposed.
    #[must_use]
    pub fn service(mut self, name: impl Into<String>) -> Self {
        self.services.push(name.into());
        self
    }

    /// Replace the runtime configuration.
    #[must_use]
    pub fn config(mut self, config: TranscodingConfig) -> Self {
        self.config = config;
        self
    }

    /// Decode the descriptors, build the route table and bind `channel`.
    ///
    /// # Errors
    ///
    /// [`RouteError`] when the descriptors do not decode or a rule is invalid.
    pub fn build<C: RpcChannel>(self, channel: C) -> Result<Gateway<C>, RouteError> {
        let pool = DescriptorPool::decode(self.descriptor_set.as_slice())?;
        let routes = RouteTable::build(
            &self.descriptor_set,
            &pool,
            &self.services,
            self.config.native_paths,
        )?;
        tracing::info!(routes = routes.len(), "transcoding gateway ready");
        Ok(Gateway {
            inner: Arc::new(Inner {
                routes,
                channel,
                config: self.config,
            }),
        })
    }
}

/// HTTP/JSON front for the RPC methods of a descriptor set.
///
/// Cheap to clone; all clones share the route table and the channel.
#[derive(Debug)]
pub struct Gateway<C = Channel> {
    inner: Arc<Inner<C>>,
}

#[derive(Debug)]
struct Inner<C> {
    routes: RouteTable,
    channel: C,
    config: TranscodingConfig,
}

impl<C> Clone for Gateway<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Gateway {
    /// Shorthand for [`GatewayBuilder::new`].
    #[must_use]
    pub fn builder(descriptor_set: impl Into<Vec<u8>>) -> GatewayBuilder {
        GatewayBuilder::new(descriptor_set)
    }
}

impl<C: RpcChannel> Gateway<C> {
    /// The route table, in match order.
    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.inner.routes
    }

    /// The runtime configuration.
    #[must_use]
    pub fn config(&self) -> &TranscodingConfig {
        &self.inner.config
    }

    /// An axum router answering every request through [`Gateway::handle`].
    ///
    /// The gateway is installed as the fallback, so routes added to the
    /// returned router (or merged into it) take precedence and unmatched
    /// requests end in a `404` JSON error.
    pub fn into_router(self) -> Router {
        Router::new().fallback(move |request: Request| {
            let gateway = self.clone();
            async move { gateway.handle(request).await }
        })
    }

    /// Serve one HTTP request.
    ///
    /// Every outcome, including routing failures, is a complete response.
    pub async fn handle(&self, request: Request) -> Response {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    TranscodeError::Upstream(status) => tracing::warn!(
                        code = ?status.code(),
                        message = status.message(),
                        "upstream call failed"
                    ),
                    other => tracing::debug!(error = %other, "request rejected"),
                }
                err.into_response()
            }
        }
    }

    async fn dispatch(&self, request: Request) -> Result<Response, TranscodeError> {
        let (parts, body) = request.into_parts();
        let path = parts.uri.path();

        let Some(found) = self.inner.routes.find(&parts.method, path) else {
            if let Some(rule) = self.inner.routes.streaming_rule_for_path(path) {
                return Err(not_allowed(&parts.method, rule));
            }
            return Err(TranscodeError::RouteNotFound {
                method: parts.method.clone(),
                path: path.to_string(),
            });
        };
        let rule = found.rule;
        tracing::debug!(method = %parts.method, path, route = %rule, "matched route");

        match rule.kind() {
            RpcKind::Unary => {}
            RpcKind::ServerStreaming if parts.method == Method::GET => {}
            RpcKind::ServerStreaming => return Err(not_allowed(&parts.method, rule)),
            kind => {
                return Err(TranscodeError::UnsupportedMethodType {
                    rpc: rule.rpc().full_name().to_string(),
                    kind,
                })
            }
        }

        let config = &self.inner.config;
        let accept = accept_header(&parts.headers);
        if rule.kind() == RpcKind::ServerStreaming && !is_acceptable(accept.as_deref(), EVENT_STREAM) {
            return Err(TranscodeError::NotAcceptable {
                content_type: EVENT_STREAM.to_string(),
            });
        }

        let body = axum::body::to_bytes(body, config.max_body_bytes)
            .await
            .map_err(|err| TranscodeError::BodyParse(format!("failed to read body: {err}")))?;
        let input = RequestVariable::new(body, parts.uri.query(), found.path_variables);
        let message = build_request(rule, &input)?;
        let request = build_rpc_request(message, &parts.headers, &config.forwarded_headers);

        if rule.kind() == RpcKind::Unary {
            self.unary(rule, request, accept.as_deref()).await
        } else {
            self.server_streaming(rule, request).await
        }
    }

    async fn unary(
        &self,
        rule: &RouteRule,
        request: tonic::Request<DynamicMessage>,
        accept: Option<&str>,
    ) -> Result<Response, TranscodeError> {
        let response = self.inner.channel.unary(rule.rpc(), request).await?;
        let (metadata, message, _) = response.into_parts();

        let rendered = project(&message, rule, self.inner.config.json)?;
        let content_type = rendered.content_type();
        if !is_acceptable(accept, content_type) {
            return Err(TranscodeError::NotAcceptable {
                content_type: content_type.to_string(),
            });
        }

        let mut headers = metadata_to_headers(&metadata);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        Ok((StatusCode::OK, headers, rendered.into_string()).into_response())
    }

    async fn server_streaming(
        &self,
        rule: &RouteRule,
        request: tonic::Request<DynamicMessage>,
    ) -> Result<Response, TranscodeError> {
        let call = self.inner.channel.server_streaming(rule.rpc(), request).await?;
        let headers = metadata_to_headers(&call.metadata);

        let events = EventStream::new(call, rule.clone(), self.inner.config.json);
        let sse = Sse::new(events);
        let mut response = if let Some(interval) = self.inner.config.sse_keep_alive() {
            sse.keep_alive(KeepAlive::new().interval(interval)).into_response()
        } else {
            sse.into_response()
        };
        response.headers_mut().extend(headers);
        Ok(response)
    }
}

fn not_allowed(method: &Method, rule: &RouteRule) -> TranscodeError {
    TranscodeError::MethodNotAllowed {
        method: method.clone(),
        rpc: rule.rpc().full_name().to_string(),
    }
}

fn accept_header(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    (!values.is_empty()).then(|| values.join(","))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Streaming,
    Completed,
    Failed,
}

/// Server-streaming responses as SSE events.
///
/// Dropped before the upstream stream finished (the client went away), it
/// cancels the call.
struct EventStream {
    messages: BoxStream<'static, Result<DynamicMessage, Status>>,
    cancel: Option<CancelHandle>,
    rule: RouteRule,
    json: JsonOptions,
    state: StreamState,
}

impl EventStream {
    fn new(call: ServerStreamingCall, rule: RouteRule, json: JsonOptions) -> Self {
        Self {
            messages: call.messages,
            cancel: Some(call.cancel),
            rule,
            json,
            state: StreamState::Streaming,
        }
    }

    fn finish(&mut self, state: StreamState) {
        self.state = state;
        self.cancel = None;
    }
}

impl Stream for EventStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.state != StreamState::Streaming {
            return Poll::Ready(None);
        }

        let event = match futures::ready!(this.messages.poll_next_unpin(cx)) {
            None => {
                tracing::debug!(route = %this.rule, "stream completed");
                this.finish(StreamState::Completed);
                return Poll::Ready(None);
            }
            Some(Ok(message)) => match project(&message, &this.rule, this.json) {
                Ok(rendered) => sse_message_event(rendered.as_str()),
                Err(err) => {
                    tracing::warn!(route = %this.rule, error = %err, "dropping stream");
                    if let Some(cancel) = this.cancel.take() {
                        cancel.cancel();
                    }
                    this.finish(StreamState::Failed);
                    sse_error_event(&err)
                }
            },
            Some(Err(status)) => {
                tracing::warn!(
                    route = %this.rule,
                    code = ?status.code(),
                    message = status.message(),
                    "upstream stream failed"
                );
                this.finish(StreamState::Failed);
                sse_error_event(&TranscodeError::Upstream(status))
            }
        };
        Poll::Ready(Some(Ok(event)))
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if self.state == StreamState::Streaming {
            if let Some(cancel) = self.cancel.take() {
                tracing::debug!(route = %self.rule, "client went away, cancelling call");
                cancel.cancel();
            }
        }
    }
}
