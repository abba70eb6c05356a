//! gRPC status to HTTP status mapping.

use axum::http::StatusCode;
use tonic::Code;

/// Every gRPC code with its canonical name and HTTP status, in code order.
///
/// `CANCELLED` is a client error: the gateway only sees it when the caller
/// went away or the upstream gave up on the call.
const STATUS_TABLE: [(Code, &str, StatusCode); 17] = [
    (Code::Ok, "OK", StatusCode::OK),
    (Code::Cancelled, "CANCELLED", StatusCode::BAD_REQUEST),
    (Code::Unknown, "UNKNOWN", StatusCode::INTERNAL_SERVER_ERROR),
    (Code::InvalidArgument, "INVALID_ARGUMENT", StatusCode::BAD_REQUEST),
    (Code::DeadlineExceeded, "DEADLINE_EXCEEDED", StatusCode::GATEWAY_TIMEOUT),
    (Code::NotFound, "NOT_FOUND", StatusCode::NOT_FOUND),
    (Code::AlreadyExists, "ALREADY_EXISTS", StatusCode::CONFLICT),
    (Code::PermissionDenied, "PERMISSION_DENIED", StatusCode::FORBIDDEN),
    (Code::ResourceExhausted, "RESOURCE_EXHAUSTED", StatusCode::TOO_MANY_REQUESTS),
    (Code::FailedPrecondition, "FAILED_PRECONDITION", StatusCode::PRECONDITION_FAILED),
    (Code::Aborted, "ABORTED", StatusCode::CONFLICT),
    (Code::OutOfRange, "OUT_OF_RANGE", StatusCode::BAD_REQUEST),
    (Code::Unimplemented, "UNIMPLEMENTED", StatusCode::NOT_IMPLEMENTED),
    (Code::Internal, "INTERNAL", StatusCode::INTERNAL_SERVER_ERROR),
    (Code::Unavailable, "UNAVAILABLE", StatusCode::SERVICE_UNAVAILABLE),
    (Code::DataLoss, "DATA_LOSS", StatusCode::INTERNAL_SERVER_ERROR),
    (Code::Unauthenticated, "UNAUTHENTICATED", StatusCode::UNAUTHORIZED),
];

fn entry(code: Code) -> Option<&'static (Code, &'static str, StatusCode)> {
    STATUS_TABLE.iter().find(|(c, _, _)| *c == code)
}

/// The `SCREAMING_SNAKE_CASE` name of a gRPC code, as used in the `status`
/// field of error bodies.
///
/// ```
/// use tonic_transcode::grpc_code_name;
///
/// assert_eq!(grpc_code_name(tonic::Code::NotFound), "NOT_FOUND");
/// ```
#[must_use]
pub fn grpc_code_name(code: Code) -> &'static str {
    entry(code).map_or("UNKNOWN", |(_, name, _)| name)
}

/// HTTP status for a gRPC code.
///
/// ```
/// use axum::http::StatusCode;
/// use tonic_transcode::grpc_to_http_status;
///
/// assert_eq!(grpc_to_http_status(tonic::Code::NotFound), StatusCode::NOT_FOUND);
/// assert_eq!(grpc_to_http_status(tonic::Code::Cancelled), StatusCode::BAD_REQUEST);
/// ```
#[must_use]
pub fn grpc_to_http_status(code: Code) -> StatusCode {
    entry(code).map_or(StatusCode::INTERNAL_SERVER_ERROR, |(_, _, status)| *status)
}

/// HTTP status for a numeric code as carried in `grpc-status`; undefined values map to 500.
///
/// ```
/// use tonic_transcode::http_status_for_raw_code;
///
/// assert_eq!(http_status_for_raw_code(5).as_u16(), 404);
/// assert_eq!(http_status_for_raw_code(99).as_u16(), 500);
/// ```
#[must_use]
pub fn http_status_for_raw_code(code: i32) -> StatusCode {
    // `Code::from` folds undefined values into `Unknown`.
    grpc_to_http_status(Code::from(code))
}
