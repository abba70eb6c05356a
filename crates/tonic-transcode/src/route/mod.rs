//! Route table: one [`RouteRule`] per HTTP binding of every transcodable RPC method.
//!
//! Rules are derived once at startup from the `google.api.http` annotations in a
//! serialized `FileDescriptorSet`. A method without an annotation is exposed at
//! `POST /{package.Service}/{Method}` with the whole body mapped onto the
//! request. Client-streaming and bidirectional methods are never registered.
//!
//! Matching walks the rules in registration order and the first hit wins.

mod template;

use std::collections::HashMap;
use std::fmt;

use http::Method;
use prost::Message as _;
use prost_reflect::{DescriptorPool, MethodDescriptor};
use tonic_transcode_core::descriptor::{extract_http_rule, FileDescriptorSet, HttpRule};

pub use template::{PathTemplate, PathVariables, TemplateError};

/// Shape of an RPC method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcKind {
    /// One request, one response.
    Unary,
    /// One request, a stream of responses.
    ServerStreaming,
    /// A stream of requests, one response.
    ClientStreaming,
    /// Streams in both directions.
    BidiStreaming,
}

impl RpcKind {
    /// Kind of a method as declared in its descriptor.
    #[must_use]
    pub fn of(method: &MethodDescriptor) -> Self {
        match (method.is_client_streaming(), method.is_server_streaming()) {
            (false, false) => Self::Unary,
            (false, true) => Self::ServerStreaming,
            (true, false) => Self::ClientStreaming,
            (true, true) => Self::BidiStreaming,
        }
    }

    /// Whether HTTP requests can be transcoded onto this kind.
    #[must_use]
    pub fn is_transcodable(self) -> bool {
        matches!(self, Self::Unary | Self::ServerStreaming)
    }
}

impl fmt::Display for RpcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unary => "unary",
            Self::ServerStreaming => "server-streaming",
            Self::ClientStreaming => "client-streaming",
            Self::BidiStreaming => "bidirectional-streaming",
        })
    }
}

/// Which part of the request message the JSON body populates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySelector {
    /// The body is ignored.
    None,
    /// `"*"`: the body is merged into the whole request message.
    Whole,
    /// The body is merged into this top-level message field only.
    Field(String),
}

impl BodySelector {
    /// Parse the `body` value of an HTTP rule.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" => Self::None,
            "*" => Self::Whole,
            field => Self::Field(field.to_string()),
        }
    }
}

/// Errors raised while building the route table.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RouteError {
    /// The descriptor bytes are not a `FileDescriptorSet`.
    #[error("failed to decode file descriptor set: {0}")]
    Decode(#[from] prost::DecodeError),

    /// The descriptor set does not form a consistent pool.
    #[error("invalid descriptor set: {0}")]
    Descriptor(#[from] prost_reflect::DescriptorError),

    /// A requested service is not in the descriptor set.
    #[error("service `{0}` not found in descriptor set")]
    ServiceNotFound(String),

    /// A custom verb is not a valid HTTP method token.
    #[error("{method}: invalid HTTP verb `{verb}`")]
    InvalidVerb {
        /// Fully-qualified RPC method name.
        method: String,
        /// Offending verb.
        verb: String,
    },

    /// An HTTP rule (or additional binding) without a pattern.
    #[error("{0}: HTTP rule has no pattern")]
    MissingPattern(String),

    /// The path template does not parse.
    #[error("{method}: {source}")]
    Template {
        /// Fully-qualified RPC method name.
        method: String,
        /// Parse failure.
        #[source]
        source: TemplateError,
    },

    /// A path variable names a repeated or map field.
    #[error("{method}: path variable `{variable}` binds to a repeated or map field")]
    RepeatedPathVariable {
        /// Fully-qualified RPC method name.
        method: String,
        /// Variable name.
        variable: String,
    },
}

/// One HTTP binding of an RPC method.
#[derive(Debug, Clone)]
pub struct RouteRule {
    method: Method,
    template: PathTemplate,
    body: BodySelector,
    response_body: Option<String>,
    rpc: MethodDescriptor,
    kind: RpcKind,
}

impl RouteRule {
    /// HTTP verb the rule answers to.
    #[must_use]
    pub fn http_method(&self) -> &Method {
        &self.method
    }

    /// Path template of the rule.
    #[must_use]
    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// Body selector of the rule.
    #[must_use]
    pub fn body(&self) -> &BodySelector {
        &self.body
    }

    /// Response field rendered instead of the whole message, if any.
    #[must_use]
    pub fn response_body(&self) -> Option<&str> {
        self.response_body.as_deref()
    }

    /// Target RPC method.
    #[must_use]
    pub fn rpc(&self) -> &MethodDescriptor {
        &self.rpc
    }

    /// Kind of the target RPC method.
    #[must_use]
    pub fn kind(&self) -> RpcKind {
        self.kind
    }

    /// gRPC request path, e.g. `/pkg.Service/Method`.
    #[must_use]
    pub fn grpc_path(&self) -> String {
        grpc_path(&self.rpc)
    }
}

impl fmt::Display for RouteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.method, self.template, self.rpc.full_name())
    }
}

/// A matched rule and the variables it captured.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    /// The first rule matching verb and path.
    pub rule: &'a RouteRule,
    /// Captured path variables, percent-decoded.
    pub path_variables: PathVariables,
}

/// Ordered, immutable list of route rules.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Build the table for `services` (all services of the set when empty).
    ///
    /// `descriptor_set` must be the bytes `pool` was decoded from; the HTTP
    /// annotations are read from it directly. With `native_paths`, annotated
    /// methods are also reachable at their default `POST /{service}/{method}`
    /// route, which is registered ahead of the annotated ones.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] for unknown services, malformed rules or path
    /// variables that bind to repeated or map fields.
    pub fn build(
        descriptor_set: &[u8],
        pool: &DescriptorPool,
        services: &[String],
        native_paths: bool,
    ) -> Result<Self, RouteError> {
        let set = FileDescriptorSet::decode(descriptor_set)?;
        let rules_by_method = http_rules_by_method(&set);

        let selected: Vec<_> = if services.is_empty() {
            pool.services().collect()
        } else {
            services
                .iter()
                .map(|name| {
                    pool.get_service_by_name(name)
                        .ok_or_else(|| RouteError::ServiceNotFound(name.clone()))
                })
                .collect::<Result<_, _>>()?
        };

        let mut rules = Vec::new();
        for service in selected {
            for rpc in service.methods() {
                let kind = RpcKind::of(&rpc);
                if !kind.is_transcodable() {
                    tracing::debug!(method = rpc.full_name(), %kind, "skipping non-transcodable method");
                    continue;
                }

                match rules_by_method.get(rpc.full_name()) {
                    Some(http_rule) => {
                        if native_paths {
                            rules.push(default_rule(&rpc, kind)?);
                        }
                        rules.push(rule_from_http(http_rule, &rpc, kind)?);
                        for binding in &http_rule.additional_bindings {
                            rules.push(rule_from_http(binding, &rpc, kind)?);
                        }
                    }
                    None => rules.push(default_rule(&rpc, kind)?),
                }
            }
        }

        for rule in &rules {
            tracing::debug!(route = %rule, "registered route");
        }
        Ok(Self { rules })
    }

    /// First rule whose verb and template match.
    #[must_use]
    pub fn find(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.rules
            .iter()
            .filter(|rule| rule.method == *method)
            .find_map(|rule| {
                rule.template.matches(path).map(|path_variables| RouteMatch {
                    rule,
                    path_variables,
                })
            })
    }

    /// First server-streaming rule whose template matches `path`, whatever its verb.
    ///
    /// Used to answer `405` rather than `404` when a streaming route is hit
    /// with the wrong verb.
    #[must_use]
    pub fn streaming_rule_for_path(&self, path: &str) -> Option<&RouteRule> {
        self.rules
            .iter()
            .filter(|rule| rule.kind == RpcKind::ServerStreaming)
            .find(|rule| rule.template.matches(path).is_some())
    }

    /// Rules in match order.
    pub fn iter(&self) -> impl Iterator<Item = &RouteRule> {
        self.rules.iter()
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Collect the HTTP rule of every annotated method, keyed by `package.Service.Method`.
#[must_use]
pub fn http_rules_by_method(set: &FileDescriptorSet) -> HashMap<String, HttpRule> {
    let mut rules = HashMap::new();
    for file in &set.file {
        let package = file.package.as_deref().unwrap_or_default();
        for service in &file.service {
            let service_name = service.name.as_deref().unwrap_or_default();
            for method in &service.method {
                let Some(rule) = extract_http_rule(method) else {
                    continue;
                };
                let method_name = method.name.as_deref().unwrap_or_default();
                let full_name = if package.is_empty() {
                    format!("{service_name}.{method_name}")
                } else {
                    format!("{package}.{service_name}.{method_name}")
                };
                rules.insert(full_name, rule.clone());
            }
        }
    }
    rules
}

fn grpc_path(rpc: &MethodDescriptor) -> String {
    format!("/{}/{}", rpc.parent_service().full_name(), rpc.name())
}

fn default_rule(rpc: &MethodDescriptor, kind: RpcKind) -> Result<RouteRule, RouteError> {
    let template = PathTemplate::parse(&grpc_path(rpc)).map_err(|source| RouteError::Template {
        method: rpc.full_name().to_string(),
        source,
    })?;
    Ok(RouteRule {
        method: Method::POST,
        template,
        body: BodySelector::Whole,
        response_body: None,
        rpc: rpc.clone(),
        kind,
    })
}

fn rule_from_http(
    rule: &HttpRule,
    rpc: &MethodDescriptor,
    kind: RpcKind,
) -> Result<RouteRule, RouteError> {
    let name = rpc.full_name();
    let (verb, path) = rule
        .verb_and_path()
        .ok_or_else(|| RouteError::MissingPattern(name.to_string()))?;
    let method = Method::from_bytes(verb.as_bytes()).map_err(|_| RouteError::InvalidVerb {
        method: name.to_string(),
        verb: verb.to_string(),
    })?;
    let template = PathTemplate::parse(path).map_err(|source| RouteError::Template {
        method: name.to_string(),
        source,
    })?;

    let input = rpc.input();
    for variable in template.variables() {
        match crate::access::find_field(&input, variable) {
            Some(field) if field.is_list() || field.is_map() => {
                return Err(RouteError::RepeatedPathVariable {
                    method: name.to_string(),
                    variable: variable.to_string(),
                });
            }
            Some(_) => {}
            None => tracing::warn!(
                method = name,
                variable,
                "path variable does not name a field of {}",
                input.full_name()
            ),
        }
    }

    let response_body = Some(rule.response_body.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(RouteRule {
        method,
        template,
        body: BodySelector::parse(&rule.body),
        response_body,
        rpc: rpc.clone(),
        kind,
    })
}
