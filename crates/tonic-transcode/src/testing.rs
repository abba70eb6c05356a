//! Descriptor fixture shared by unit and integration tests.
//!
//! Mirrors this proto (plus a trimmed `google/protobuf/wrappers.proto`):
//!
//! ```proto
//! package transcoding;
//!
//! enum Kind { KIND_UNSPECIFIED = 0; KIND_BASIC = 1; KIND_PREMIUM = 2; }
//!
//! message SimpleRequest {
//!   string requestMessage = 1;
//!   string some_message = 2;
//!   SimpleRequest nested = 3;
//!   repeated string tags = 4;
//!   Kind kind = 5;
//!   google.protobuf.Int32Value int32_wrapper = 6;
//!   int64 count = 7;
//!   bool flag = 8;
//!   bytes payload = 9;
//!   double ratio = 10;
//!   map<string, string> labels = 11;
//!   repeated SimpleRequest children = 12;
//!   oneof choice { string alpha = 13; int32 beta = 14; }
//! }
//!
//! message SimpleResponse { string responseMessage = 1; SimpleRequest echo = 2; }
//!
//! service SimpleService {
//!   rpc UnaryRpc(SimpleRequest) returns (SimpleResponse) { post: "/v1/unaryrpc" body: "*" }
//!   rpc GetEcho(SimpleRequest) returns (SimpleResponse) {
//!     get: "/v1/echo/{requestMessage}" response_body: "echo"
//!     additional_bindings { get: "/v1/echo/{requestMessage}:peek" response_body: "responseMessage" }
//!   }
//!   rpc NestedRpc(SimpleRequest) returns (SimpleResponse) { post: "/v1/nested/{requestMessage}" body: "nested" }
//!   rpc CancelItem(SimpleRequest) returns (SimpleResponse) { post: "/v1/items/{requestMessage}:cancel" }
//!   rpc ServerStreamingRpc(SimpleRequest) returns (stream SimpleResponse) { get: "/v1/stream/{requestMessage}" }
//!   rpc DefaultStream(SimpleRequest) returns (stream SimpleResponse);
//!   rpc ClientStreamingRpc(stream SimpleRequest) returns (SimpleResponse);
//!   rpc BidiStreamingRpc(stream SimpleRequest) returns (stream SimpleResponse) { get: "/v1/bidi" }
//!   rpc Echo(google.protobuf.StringValue) returns (google.protobuf.StringValue);
//! }
//! ```

#![allow(dead_code)]

use prost::Message as _;
use prost_reflect::{DescriptorPool, MessageDescriptor, MethodDescriptor};
use tonic_transcode_core::descriptor::{
    field_label, field_type, DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto,
    FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet, HttpPattern, HttpRule,
    MessageOptions, MethodDescriptorProto, MethodOptions, OneofDescriptorProto,
    ServiceDescriptorProto,
};

pub const SERVICE: &str = "transcoding.SimpleService";
pub const REQUEST: &str = "transcoding.SimpleRequest";
pub const RESPONSE: &str = "transcoding.SimpleResponse";
pub const STRING_VALUE: &str = "google.protobuf.StringValue";

fn json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn field(name: &str, number: i32, ty: i32) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(field_label::OPTIONAL),
        r#type: Some(ty),
        json_name: Some(json_name(name)),
        ..FieldDescriptorProto::default()
    }
}

fn typed(name: &str, number: i32, ty: i32, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_string()),
        ..field(name, number, ty)
    }
}

fn repeated(field: FieldDescriptorProto) -> FieldDescriptorProto {
    FieldDescriptorProto {
        label: Some(field_label::REPEATED),
        ..field
    }
}

fn in_oneof(field: FieldDescriptorProto, index: i32) -> FieldDescriptorProto {
    FieldDescriptorProto {
        oneof_index: Some(index),
        ..field
    }
}

fn wrapper(name: &str, ty: i32) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: vec![field("value", 1, ty)],
        ..DescriptorProto::default()
    }
}

fn http(pattern: HttpPattern, body: &str) -> HttpRule {
    HttpRule {
        pattern: Some(pattern),
        body: body.to_string(),
        ..HttpRule::default()
    }
}

fn method(
    name: &str,
    input: &str,
    output: &str,
    streaming: (bool, bool),
    rule: Option<HttpRule>,
) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(format!(".{input}")),
        output_type: Some(format!(".{output}")),
        options: rule.map(|r| MethodOptions { http: Some(r) }),
        client_streaming: Some(streaming.0),
        server_streaming: Some(streaming.1),
    }
}

fn wrappers_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("google/protobuf/wrappers.proto".to_string()),
        package: Some("google.protobuf".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![
            wrapper("StringValue", field_type::STRING),
            wrapper("Int32Value", field_type::INT32),
        ],
        ..FileDescriptorProto::default()
    }
}

fn simple_request() -> DescriptorProto {
    let labels_entry = DescriptorProto {
        name: Some("LabelsEntry".to_string()),
        field: vec![
            field("key", 1, field_type::STRING),
            field("value", 2, field_type::STRING),
        ],
        options: Some(MessageOptions {
            map_entry: Some(true),
        }),
        ..DescriptorProto::default()
    };

    DescriptorProto {
        name: Some("SimpleRequest".to_string()),
        field: vec![
            field("requestMessage", 1, field_type::STRING),
            field("some_message", 2, field_type::STRING),
            typed("nested", 3, field_type::MESSAGE, ".transcoding.SimpleRequest"),
            repeated(field("tags", 4, field_type::STRING)),
            typed("kind", 5, field_type::ENUM, ".transcoding.Kind"),
            typed(
                "int32_wrapper",
                6,
                field_type::MESSAGE,
                ".google.protobuf.Int32Value",
            ),
            field("count", 7, field_type::INT64),
            field("flag", 8, field_type::BOOL),
            field("payload", 9, field_type::BYTES),
            field("ratio", 10, field_type::DOUBLE),
            repeated(typed(
                "labels",
                11,
                field_type::MESSAGE,
                ".transcoding.SimpleRequest.LabelsEntry",
            )),
            repeated(typed(
                "children",
                12,
                field_type::MESSAGE,
                ".transcoding.SimpleRequest",
            )),
            in_oneof(field("alpha", 13, field_type::STRING), 0),
            in_oneof(field("beta", 14, field_type::INT32), 0),
        ],
        nested_type: vec![labels_entry],
        oneof_decl: vec![OneofDescriptorProto {
            name: Some("choice".to_string()),
        }],
        ..DescriptorProto::default()
    }
}

fn simple_service() -> ServiceDescriptorProto {
    let mut get_echo = http(HttpPattern::Get("/v1/echo/{requestMessage}".into()), "");
    get_echo.response_body = "echo".to_string();
    let mut peek = http(HttpPattern::Get("/v1/echo/{requestMessage}:peek".into()), "");
    peek.response_body = "responseMessage".to_string();
    get_echo.additional_bindings = vec![peek];

    ServiceDescriptorProto {
        name: Some("SimpleService".to_string()),
        method: vec![
            method(
                "UnaryRpc",
                REQUEST,
                RESPONSE,
                (false, false),
                Some(http(HttpPattern::Post("/v1/unaryrpc".into()), "*")),
            ),
            method("GetEcho", REQUEST, RESPONSE, (false, false), Some(get_echo)),
            method(
                "NestedRpc",
                REQUEST,
                RESPONSE,
                (false, false),
                Some(http(
                    HttpPattern::Post("/v1/nested/{requestMessage}".into()),
                    "nested",
                )),
            ),
            method(
                "CancelItem",
                REQUEST,
                RESPONSE,
                (false, false),
                Some(http(
                    HttpPattern::Post("/v1/items/{requestMessage}:cancel".into()),
                    "",
                )),
            ),
            method(
                "ServerStreamingRpc",
                REQUEST,
                RESPONSE,
                (false, true),
                Some(http(
                    HttpPattern::Get("/v1/stream/{requestMessage}".into()),
                    "",
                )),
            ),
            method("DefaultStream", REQUEST, RESPONSE, (false, true), None),
            method("ClientStreamingRpc", REQUEST, RESPONSE, (true, false), None),
            method(
                "BidiStreamingRpc",
                REQUEST,
                RESPONSE,
                (true, true),
                Some(http(HttpPattern::Get("/v1/bidi".into()), "")),
            ),
            method("Echo", STRING_VALUE, STRING_VALUE, (false, false), None),
        ],
    }
}

/// The fixture as descriptor messages.
pub fn descriptor_set() -> FileDescriptorSet {
    let simple = FileDescriptorProto {
        name: Some("transcoding/simple.proto".to_string()),
        package: Some("transcoding".to_string()),
        dependency: vec!["google/protobuf/wrappers.proto".to_string()],
        syntax: Some("proto3".to_string()),
        message_type: vec![
            simple_request(),
            DescriptorProto {
                name: Some("SimpleResponse".to_string()),
                field: vec![
                    field("responseMessage", 1, field_type::STRING),
                    typed("echo", 2, field_type::MESSAGE, ".transcoding.SimpleRequest"),
                ],
                ..DescriptorProto::default()
            },
        ],
        enum_type: vec![EnumDescriptorProto {
            name: Some("Kind".to_string()),
            value: ["KIND_UNSPECIFIED", "KIND_BASIC", "KIND_PREMIUM"]
                .iter()
                .zip(0..)
                .map(|(name, number)| EnumValueDescriptorProto {
                    name: Some((*name).to_string()),
                    number: Some(number),
                })
                .collect(),
        }],
        service: vec![simple_service()],
    };

    FileDescriptorSet {
        file: vec![wrappers_file(), simple],
    }
}

/// The fixture serialized the way `protoc --include_imports` would emit it.
pub fn descriptor_bytes() -> Vec<u8> {
    descriptor_set().encode_to_vec()
}

/// Descriptor pool decoded from [`descriptor_bytes`].
pub fn pool() -> DescriptorPool {
    DescriptorPool::decode(descriptor_bytes().as_slice()).expect("fixture descriptors are valid")
}

/// Look up a message of the fixture by full name.
pub fn message(full_name: &str) -> MessageDescriptor {
    pool()
        .get_message_by_name(full_name)
        .unwrap_or_else(|| panic!("fixture has no message {full_name}"))
}

/// Look up a method of `transcoding.SimpleService`.
pub fn rpc(name: &str) -> MethodDescriptor {
    pool()
        .get_service_by_name(SERVICE)
        .and_then(|s| s.methods().find(|m| m.name() == name))
        .unwrap_or_else(|| panic!("fixture has no method {name}"))
}
