//! Shared helpers for the gateway integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, Response};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use http_body_util::BodyExt;
use prost_reflect::{DynamicMessage, MethodDescriptor, Value};
use tonic::metadata::MetadataMap;
use tonic::Status;
use tower::ServiceExt;

use tonic_transcode::{CancelHandle, Gateway, RpcChannel, ServerStreamingCall, TranscodingConfig};

#[path = "../../src/testing.rs"]
pub mod fixtures;

/// A call the gateway sent upstream.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub metadata: MetadataMap,
    pub message: DynamicMessage,
}

impl Recorded {
    /// The request message as proto3 JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::to_value(&self.message).unwrap()
    }
}

/// What the channel answers to a unary call.
#[derive(Debug, Clone)]
pub enum UnaryReply {
    /// Echo the request: as-is when input and output types match, otherwise
    /// as `SimpleResponse { responseMessage: "ok", echo: request }`.
    Echo,
    /// Reply with this message and these headers.
    Message(DynamicMessage, MetadataMap),
    /// Fail with this status.
    Fail(Status),
}

/// Items of a scripted server stream.
#[derive(Debug, Clone)]
pub struct Script {
    pub items: Vec<Result<DynamicMessage, Status>>,
    /// Keep the stream open after the last item.
    pub hold_open: bool,
}

#[derive(Debug)]
struct State {
    requests: Vec<Recorded>,
    unary: UnaryReply,
    stream: Script,
    open_error: Option<Status>,
}

/// In-memory [`RpcChannel`] recording every call.
#[derive(Debug, Clone)]
pub struct MockChannel {
    state: Arc<Mutex<State>>,
    cancels: Arc<AtomicUsize>,
}

impl Default for MockChannel {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                requests: Vec::new(),
                unary: UnaryReply::Echo,
                stream: Script {
                    items: Vec::new(),
                    hold_open: false,
                },
                open_error: None,
            })),
            cancels: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockChannel {
    pub fn reply(&self, reply: UnaryReply) {
        self.state.lock().unwrap().unary = reply;
    }

    pub fn stream(&self, items: Vec<Result<DynamicMessage, Status>>, hold_open: bool) {
        self.state.lock().unwrap().stream = Script { items, hold_open };
    }

    pub fn fail_stream_open(&self, status: Status) {
        self.state.lock().unwrap().open_error = Some(status);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.requests().pop().expect("no upstream call was made")
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    fn record(&self, method: &MethodDescriptor, request: tonic::Request<DynamicMessage>) -> DynamicMessage {
        let (metadata, _, message) = request.into_parts();
        self.state.lock().unwrap().requests.push(Recorded {
            method: method.full_name().to_string(),
            metadata,
            message: message.clone(),
        });
        message
    }
}

impl RpcChannel for MockChannel {
    fn unary(
        &self,
        method: &MethodDescriptor,
        request: tonic::Request<DynamicMessage>,
    ) -> BoxFuture<'static, Result<tonic::Response<DynamicMessage>, Status>> {
        let message = self.record(method, request);
        let reply = self.state.lock().unwrap().unary.clone();
        let result = match reply {
            UnaryReply::Echo if method.input() == method.output() => Ok(tonic::Response::new(message)),
            UnaryReply::Echo => {
                let mut response = DynamicMessage::new(method.output());
                response.set_field_by_name("responseMessage", Value::String("ok".into()));
                response.set_field_by_name("echo", Value::Message(message));
                Ok(tonic::Response::new(response))
            }
            UnaryReply::Message(response, metadata) => {
                let mut response = tonic::Response::new(response);
                *response.metadata_mut() = metadata;
                Ok(response)
            }
            UnaryReply::Fail(status) => Err(status),
        };
        futures::future::ready(result).boxed()
    }

    fn server_streaming(
        &self,
        method: &MethodDescriptor,
        request: tonic::Request<DynamicMessage>,
    ) -> BoxFuture<'static, Result<ServerStreamingCall, Status>> {
        self.record(method, request);
        let state = self.state.lock().unwrap();
        if let Some(status) = state.open_error.clone() {
            return futures::future::ready(Err(status)).boxed();
        }

        let items = stream::iter(state.stream.items.clone());
        let messages = if state.stream.hold_open {
            items.chain(stream::pending()).boxed()
        } else {
            items.boxed()
        };
        let cancels = Arc::clone(&self.cancels);
        let call = ServerStreamingCall {
            metadata: MetadataMap::new(),
            messages,
            cancel: CancelHandle::new(move || {
                cancels.fetch_add(1, Ordering::SeqCst);
            }),
        };
        futures::future::ready(Ok(call)).boxed()
    }
}

/// Gateway over the fixture descriptors.
pub fn gateway(channel: &MockChannel, config: TranscodingConfig) -> Gateway<MockChannel> {
    Gateway::builder(fixtures::descriptor_bytes())
        .config(config)
        .build(channel.clone())
        .unwrap()
}

/// `SimpleResponse` parsed from JSON.
pub fn response(json: &str) -> DynamicMessage {
    tonic_transcode::parse_json(fixtures::message(fixtures::RESPONSE), json.as_bytes()).unwrap()
}

pub async fn send(gateway: &Gateway<MockChannel>, request: Request<Body>) -> Response<Body> {
    gateway.clone().into_router().oneshot(request).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn post(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}
