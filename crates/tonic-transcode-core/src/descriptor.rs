//! Minimal protobuf descriptor types with `google.api.http` extension support.
//!
//! Only the parts of `descriptor.proto` the gateway reads are modelled: files,
//! messages (with oneofs and map entries), enums, services and the HTTP rule on
//! each method. Everything else is skipped by prost during decoding.

#[allow(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
mod types {
    use prost::Message;

    #[derive(Clone, PartialEq, Message)]
    pub struct FileDescriptorSet {
        #[prost(message, repeated, tag = "1")]
        pub file: Vec<FileDescriptorProto>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct FileDescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(string, optional, tag = "2")]
        pub package: Option<String>,
        #[prost(string, repeated, tag = "3")]
        pub dependency: Vec<String>,
        #[prost(message, repeated, tag = "4")]
        pub message_type: Vec<DescriptorProto>,
        #[prost(message, repeated, tag = "5")]
        pub enum_type: Vec<EnumDescriptorProto>,
        #[prost(message, repeated, tag = "6")]
        pub service: Vec<ServiceDescriptorProto>,
        /// `"proto2"`, `"proto3"` or `"editions"`; absent means proto2.
        #[prost(string, optional, tag = "12")]
        pub syntax: Option<String>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct DescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(message, repeated, tag = "2")]
        pub field: Vec<FieldDescriptorProto>,
        #[prost(message, repeated, tag = "3")]
        pub nested_type: Vec<DescriptorProto>,
        #[prost(message, repeated, tag = "4")]
        pub enum_type: Vec<EnumDescriptorProto>,
        #[prost(message, optional, tag = "7")]
        pub options: Option<MessageOptions>,
        #[prost(message, repeated, tag = "8")]
        pub oneof_decl: Vec<OneofDescriptorProto>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct MessageOptions {
        /// Set by protoc on the synthetic `XxxEntry` type backing a `map<K, V>` field.
        #[prost(bool, optional, tag = "7")]
        pub map_entry: Option<bool>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct OneofDescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct FieldDescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(int32, optional, tag = "3")]
        pub number: Option<i32>,
        /// 1=optional, 2=required, 3=repeated.
        #[prost(int32, optional, tag = "4")]
        pub label: Option<i32>,
        /// Protobuf field type enum: 1=double, 5=int32, 9=string, 11=message, 14=enum, …
        #[prost(int32, optional, tag = "5")]
        pub r#type: Option<i32>,
        /// Fully-qualified type name for message/enum fields (e.g., `.shop.v1.Item`).
        #[prost(string, optional, tag = "6")]
        pub type_name: Option<String>,
        #[prost(int32, optional, tag = "9")]
        pub oneof_index: Option<i32>,
        #[prost(string, optional, tag = "10")]
        pub json_name: Option<String>,
        #[prost(bool, optional, tag = "17")]
        pub proto3_optional: Option<bool>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct EnumDescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(message, repeated, tag = "2")]
        pub value: Vec<EnumValueDescriptorProto>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct EnumValueDescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(int32, optional, tag = "2")]
        pub number: Option<i32>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct ServiceDescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(message, repeated, tag = "2")]
        pub method: Vec<MethodDescriptorProto>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct MethodDescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(string, optional, tag = "2")]
        pub input_type: Option<String>,
        #[prost(string, optional, tag = "3")]
        pub output_type: Option<String>,
        #[prost(message, optional, tag = "4")]
        pub options: Option<MethodOptions>,
        #[prost(bool, optional, tag = "5")]
        pub client_streaming: Option<bool>,
        #[prost(bool, optional, tag = "6")]
        pub server_streaming: Option<bool>,
    }

    /// Method options with the `google.api.http` extension (field 72295728).
    #[derive(Clone, PartialEq, Message)]
    pub struct MethodOptions {
        #[prost(message, optional, tag = "72295728")]
        pub http: Option<HttpRule>,
    }

    /// [`google.api.HttpRule`] defines the HTTP mapping of an RPC.
    #[derive(Clone, PartialEq, Message)]
    pub struct HttpRule {
        #[prost(string, tag = "1")]
        pub selector: String,
        #[prost(oneof = "HttpPattern", tags = "2, 3, 4, 5, 6, 8")]
        pub pattern: Option<HttpPattern>,
        #[prost(string, tag = "7")]
        pub body: String,
        #[prost(string, tag = "12")]
        pub response_body: String,
        /// Nested rules must not carry further `additional_bindings`.
        #[prost(message, repeated, tag = "11")]
        pub additional_bindings: Vec<HttpRule>,
    }

    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum HttpPattern {
        #[prost(string, tag = "2")]
        Get(String),
        #[prost(string, tag = "3")]
        Put(String),
        #[prost(string, tag = "4")]
        Post(String),
        #[prost(string, tag = "5")]
        Delete(String),
        #[prost(string, tag = "6")]
        Patch(String),
        #[prost(message, tag = "8")]
        Custom(CustomHttpPattern),
    }

    /// Arbitrary HTTP verb, e.g. `HEAD` or `OPTIONS`.
    #[derive(Clone, PartialEq, Message)]
    pub struct CustomHttpPattern {
        #[prost(string, tag = "1")]
        pub kind: String,
        #[prost(string, tag = "2")]
        pub path: String,
    }
}

pub use types::*;

/// Proto field type constants (from `google.protobuf.FieldDescriptorProto.Type`).
pub mod field_type {
    /// `TYPE_DOUBLE = 1`
    pub const DOUBLE: i32 = 1;
    /// `TYPE_INT64 = 3`
    pub const INT64: i32 = 3;
    /// `TYPE_INT32 = 5`
    pub const INT32: i32 = 5;
    /// `TYPE_BOOL = 8`
    pub const BOOL: i32 = 8;
    /// `TYPE_STRING = 9`
    pub const STRING: i32 = 9;
    /// `TYPE_MESSAGE = 11`
    pub const MESSAGE: i32 = 11;
    /// `TYPE_BYTES = 12`
    pub const BYTES: i32 = 12;
    /// `TYPE_ENUM = 14`
    pub const ENUM: i32 = 14;
}

/// Proto field label constants (from `google.protobuf.FieldDescriptorProto.Label`).
pub mod field_label {
    /// `LABEL_OPTIONAL = 1`
    pub const OPTIONAL: i32 = 1;
    /// `LABEL_REPEATED = 3`
    pub const REPEATED: i32 = 3;
}

/// Return the `google.api.http` rule attached to a method, if any.
#[must_use]
pub fn extract_http_rule(method: &MethodDescriptorProto) -> Option<&HttpRule> {
    method.options.as_ref().and_then(|o| o.http.as_ref())
}

impl HttpRule {
    /// Upper-case HTTP verb and path template of this rule.
    ///
    /// Returns `None` when the rule carries no pattern at all.
    #[must_use]
    pub fn verb_and_path(&self) -> Option<(&str, &str)> {
        Some(match self.pattern.as_ref()? {
            HttpPattern::Get(p) => ("GET", p.as_str()),
            HttpPattern::Put(p) => ("PUT", p.as_str()),
            HttpPattern::Post(p) => ("POST", p.as_str()),
            HttpPattern::Delete(p) => ("DELETE", p.as_str()),
            HttpPattern::Patch(p) => ("PATCH", p.as_str()),
            HttpPattern::Custom(custom) => (custom.kind.as_str(), custom.path.as_str()),
        })
    }
}

#[cfg(test)]
mod tests {
    use prost::Message as _;

    use super::*;

    fn method_with_rule(rule: HttpRule) -> MethodDescriptorProto {
        MethodDescriptorProto {
            name: Some("TestMethod".to_string()),
            input_type: Some(".test.v1.Request".to_string()),
            output_type: Some(".test.v1.Response".to_string()),
            options: Some(MethodOptions { http: Some(rule) }),
            client_streaming: None,
            server_streaming: None,
        }
    }

    fn rule(pattern: HttpPattern) -> HttpRule {
        HttpRule {
            pattern: Some(pattern),
            ..HttpRule::default()
        }
    }

    #[test]
    fn standard_verbs() {
        let cases = [
            (HttpPattern::Get("/v1/items".into()), "GET"),
            (HttpPattern::Put("/v1/items/{id}".into()), "PUT"),
            (HttpPattern::Post("/v1/items".into()), "POST"),
            (HttpPattern::Delete("/v1/items/{id}".into()), "DELETE"),
            (HttpPattern::Patch("/v1/items/{id}".into()), "PATCH"),
        ];
        for (pattern, expected) in cases {
            let r = rule(pattern);
            let (verb, path) = r.verb_and_path().unwrap();
            assert_eq!(verb, expected);
            assert!(path.starts_with("/v1/items"));
        }
    }

    #[test]
    fn custom_verb_keeps_kind() {
        let r = rule(HttpPattern::Custom(CustomHttpPattern {
            kind: "HEAD".to_string(),
            path: "/v1/items".to_string(),
        }));
        assert_eq!(r.verb_and_path(), Some(("HEAD", "/v1/items")));
    }

    #[test]
    fn rule_without_pattern() {
        let r = HttpRule {
            body: "*".to_string(),
            ..HttpRule::default()
        };
        assert!(r.verb_and_path().is_none());
    }

    #[test]
    fn returns_none_without_options() {
        let method = MethodDescriptorProto {
            name: Some("NoOptions".to_string()),
            ..MethodDescriptorProto::default()
        };
        assert!(extract_http_rule(&method).is_none());

        let method = MethodDescriptorProto {
            options: Some(MethodOptions { http: None }),
            ..method
        };
        assert!(extract_http_rule(&method).is_none());
    }

    /// The extension survives an encode → decode cycle, including nested bindings.
    #[test]
    fn http_rule_survives_decoding() {
        let mut primary = rule(HttpPattern::Get("/v1/items/{id}".to_string()));
        primary.response_body = "item".to_string();
        primary.additional_bindings = vec![rule(HttpPattern::Post("/v1/items:lookup".into()))];

        let original = FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("test.proto".to_string()),
                package: Some("test.v1".to_string()),
                syntax: Some("proto3".to_string()),
                message_type: vec![DescriptorProto {
                    name: Some("Req".to_string()),
                    field: vec![FieldDescriptorProto {
                        name: Some("id".to_string()),
                        number: Some(1),
                        label: Some(field_label::OPTIONAL),
                        r#type: Some(field_type::STRING),
                        ..FieldDescriptorProto::default()
                    }],
                    ..DescriptorProto::default()
                }],
                service: vec![ServiceDescriptorProto {
                    name: Some("Svc".to_string()),
                    method: vec![method_with_rule(primary)],
                }],
                ..FileDescriptorProto::default()
            }],
        };

        let bytes = original.encode_to_vec();
        let decoded = FileDescriptorSet::decode(bytes.as_slice()).unwrap();
        assert_eq!(original, decoded);

        let method = &decoded.file[0].service[0].method[0];
        let http = extract_http_rule(method).unwrap();
        assert_eq!(http.response_body, "item");
        assert_eq!(
            http.additional_bindings[0].verb_and_path(),
            Some(("POST", "/v1/items:lookup"))
        );
    }
}
