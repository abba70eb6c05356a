//! HTTP header ⇄ gRPC metadata conversion.

use axum::http::{HeaderMap, HeaderName};
use tonic::metadata::{Ascii, MetadataKey, MetadataMap, MetadataValue};
use tonic::Request;

/// Request headers forwarded to the upstream call as metadata.
///
/// Extend the list per gateway with
/// [`TranscodingConfig::forward_header`](crate::TranscodingConfig::forward_header).
pub const FORWARDED_HEADERS: &[&str] = &[
    "authorization",
    "user-agent",
    "x-forwarded-for",
    "x-real-ip",
    "x-request-id",
    "accept-language",
    "traceparent",
    "tracestate",
];

/// Response headers that belong to the HTTP connection or that the gateway
/// writes itself; never copied from upstream metadata.
const RESERVED_RESPONSE_HEADERS: &[&str] = &[
    "content-type",
    "content-length",
    "content-encoding",
    "transfer-encoding",
    "connection",
    "keep-alive",
    "te",
    "trailer",
    "upgrade",
];

/// Build a [`tonic::Request`] carrying the allowlisted request headers.
///
/// Both [`FORWARDED_HEADERS`] and `extra` are consulted. Values that are not
/// valid ASCII metadata are skipped rather than failing the request.
///
/// # Examples
///
/// ```
/// use axum::http::HeaderMap;
/// use tonic_transcode::build_rpc_request;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("authorization", "Bearer token".parse().unwrap());
/// headers.insert("x-tenant", "acme".parse().unwrap());
///
/// let req = build_rpc_request("body", &headers, &["x-tenant".to_string()]);
/// assert_eq!(req.metadata().get("authorization").unwrap(), "Bearer token");
/// assert_eq!(req.metadata().get("x-tenant").unwrap(), "acme");
/// ```
pub fn build_rpc_request<T>(body: T, headers: &HeaderMap, extra: &[String]) -> Request<T> {
    let mut req = Request::new(body);
    let metadata = req.metadata_mut();

    let names = FORWARDED_HEADERS
        .iter()
        .copied()
        .chain(extra.iter().map(String::as_str));
    for name in names {
        let Ok(key) = name.parse::<MetadataKey<Ascii>>() else {
            continue;
        };
        // Listed twice (default and extra).
        if metadata.contains_key(name) {
            continue;
        }
        // A header may repeat; forward every value.
        for value in headers.get_all(name) {
            let Some(parsed) = value
                .to_str()
                .ok()
                .and_then(|v| v.parse::<MetadataValue<Ascii>>().ok()) else {
                continue;
            };
            metadata.append(key.clone(), parsed);
        }
    }

    req
}

/// Copy upstream metadata into HTTP response headers.
///
/// Drops gRPC protocol keys (`grpc-*`), binary metadata (`*-bin`) and headers
/// reserved for the HTTP layer.
///
/// ```
/// use tonic::metadata::{MetadataMap, MetadataValue};
/// use tonic_transcode::metadata_to_headers;
///
/// let mut metadata = MetadataMap::new();
/// metadata.insert("request-id", MetadataValue::from_static("001"));
/// metadata.insert("grpc-status", MetadataValue::from_static("0"));
///
/// let headers = metadata_to_headers(&metadata);
/// assert_eq!(headers.get("request-id").unwrap(), "001");
/// assert!(headers.get("grpc-status").is_none());
/// ```
#[must_use]
pub fn metadata_to_headers(metadata: &MetadataMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let mut current: Option<HeaderName> = None;
    // `HeaderMap::into_iter` yields `None` names for repeated values of the previous key.
    for (name, value) in metadata.clone().into_headers() {
        if let Some(name) = name {
            current = Some(name);
        }
        let Some(name) = current.as_ref() else {
            continue;
        };
        if is_forwardable(name) {
            headers.append(name.clone(), value);
        }
    }
    headers
}

fn is_forwardable(name: &HeaderName) -> bool {
    let name = name.as_str();
    !(name.starts_with("grpc-")
        || name.ends_with("-bin")
        || RESERVED_RESPONSE_HEADERS.contains(&name))
}
