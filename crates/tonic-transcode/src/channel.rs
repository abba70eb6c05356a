//! Upstream invocation of dynamically typed RPC methods.
//!
//! [`RpcChannel`] is the seam between the dispatcher and the transport. It is
//! implemented for [`tonic::transport::Channel`]; tests substitute their own.

use std::fmt;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use http::uri::PathAndQuery;
use prost_reflect::{DynamicMessage, MessageDescriptor, MethodDescriptor};
use tonic::client::Grpc;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::metadata::MetadataMap;
use tonic::transport::Channel;
use tonic::{Request, Response, Status};

/// Stops an in-flight server-streaming call. Runs at most once.
pub struct CancelHandle(Option<Box<dyn FnOnce() + Send>>);

impl CancelHandle {
    /// Wrap the action that cancels the call.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(cancel)))
    }

    /// A handle that does nothing.
    #[must_use]
    pub fn noop() -> Self {
        Self(None)
    }

    /// Cancel the call.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.0.take() {
            cancel();
        }
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CancelHandle")
            .field(&if self.0.is_some() { "armed" } else { "noop" })
            .finish()
    }
}

/// An open server-streaming call.
pub struct ServerStreamingCall {
    /// Response headers sent by the upstream.
    pub metadata: MetadataMap,
    /// Response messages in delivery order; an `Err` ends the stream.
    pub messages: BoxStream<'static, Result<DynamicMessage, Status>>,
    /// Cancels the call when the client goes away.
    pub cancel: CancelHandle,
}

impl fmt::Debug for ServerStreamingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerStreamingCall")
            .field("metadata", &self.metadata)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

/// Something that can carry unary and server-streaming calls.
///
/// Implementations are shared by all requests and must be cheap to clone.
pub trait RpcChannel: Clone + Send + Sync + 'static {
    /// Issue a unary call.
    fn unary(
        &self,
        method: &MethodDescriptor,
        request: Request<DynamicMessage>,
    ) -> BoxFuture<'static, Result<Response<DynamicMessage>, Status>>;

    /// Open a server-streaming call.
    fn server_streaming(
        &self,
        method: &MethodDescriptor,
        request: Request<DynamicMessage>,
    ) -> BoxFuture<'static, Result<ServerStreamingCall, Status>>;
}

/// gRPC path of a method, e.g. `/pkg.Service/Method`.
///
/// # Errors
///
/// [`Status::internal`] if the names do not form a valid URI path.
pub fn method_path(method: &MethodDescriptor) -> Result<PathAndQuery, Status> {
    let path = format!("/{}/{}", method.parent_service().full_name(), method.name());
    path.parse()
        .map_err(|err| Status::internal(format!("invalid gRPC path {path}: {err}")))
}

async fn ready(channel: &Channel) -> Result<Grpc<Channel>, Status> {
    let mut grpc = Grpc::new(channel.clone());
    grpc.ready()
        .await
        .map_err(|err| Status::unavailable(format!("upstream not ready: {err}")))?;
    Ok(grpc)
}

impl RpcChannel for Channel {
    fn unary(
        &self,
        method: &MethodDescriptor,
        request: Request<DynamicMessage>,
    ) -> BoxFuture<'static, Result<Response<DynamicMessage>, Status>> {
        let channel = self.clone();
        let path = method_path(method);
        let codec = DynamicCodec::new(method.output());
        async move {
            let path = path?;
            let mut grpc = ready(&channel).await?;
            grpc.unary(request, path, codec).await
        }
        .boxed()
    }

    fn server_streaming(
        &self,
        method: &MethodDescriptor,
        request: Request<DynamicMessage>,
    ) -> BoxFuture<'static, Result<ServerStreamingCall, Status>> {
        let channel = self.clone();
        let path = method_path(method);
        let codec = DynamicCodec::new(method.output());
        async move {
            let path = path?;
            let mut grpc = ready(&channel).await?;
            let response = grpc.server_streaming(request, path, codec).await?;
            let (metadata, streaming, _) = response.into_parts();
            // Aborting stops polling; dropping the aborted stream resets the HTTP/2 stream.
            let (messages, abort) = futures::stream::abortable(streaming);
            Ok(ServerStreamingCall {
                metadata,
                messages: messages.boxed(),
                cancel: CancelHandle::new(move || abort.abort()),
            })
        }
        .boxed()
    }
}

/// `tonic` codec for [`DynamicMessage`]s of a known response type.
#[derive(Debug, Clone)]
pub struct DynamicCodec {
    response: MessageDescriptor,
}

impl DynamicCodec {
    /// Codec decoding responses of type `response`.
    #[must_use]
    pub fn new(response: MessageDescriptor) -> Self {
        Self { response }
    }
}

impl Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = DynamicMessage;
    type Encoder = DynamicEncoder;
    type Decoder = DynamicDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        DynamicDecoder(self.response.clone())
    }
}

#[doc(hidden)]
#[derive(Debug)]
pub struct DynamicEncoder;

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        prost::Message::encode(&item, dst)
            .map_err(|err| Status::internal(format!("failed to encode request: {err}")))
    }
}

#[doc(hidden)]
#[derive(Debug)]
pub struct DynamicDecoder(MessageDescriptor);

impl Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    // Called once per complete frame; an empty frame is a message with all defaults.
    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        DynamicMessage::decode(self.0.clone(), src)
            .map(Some)
            .map_err(|err| Status::internal(format!("failed to decode response: {err}")))
    }
}
