//! Response projection: the response message (or one of its fields) rendered
//! as the HTTP body.
//!
//! Rendering follows the proto3 JSON mapping, so wrapper types and
//! `google.protobuf.Value` scalars come out as bare JSON (`"Freeman"`, `42`,
//! `null`) rather than objects.

use prost_reflect::{DynamicMessage, ReflectMessage, SerializeOptions, Value};

use crate::access::find_field;
use crate::config::JsonOptions;
use crate::route::RouteRule;
use crate::runtime::TranscodeError;

/// Content type of object and array bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content type of bare scalar bodies.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// A rendered response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBody {
    text: String,
}

impl RenderedBody {
    /// Wrap already rendered JSON text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The JSON text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// `application/json` for objects and arrays, `text/plain` otherwise.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        let text = self.text.trim();
        let bracketed = (text.starts_with('{') && text.ends_with('}'))
            || (text.starts_with('[') && text.ends_with(']'));
        if bracketed {
            JSON_CONTENT_TYPE
        } else {
            TEXT_CONTENT_TYPE
        }
    }

    /// Consume into the JSON text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }
}

/// Render `response` for `rule`: its `response_body` field when the rule names
/// an existing one, the whole message otherwise.
///
/// # Errors
///
/// [`TranscodeError::Internal`] if the message cannot be serialized.
pub fn project(
    response: &DynamicMessage,
    rule: &RouteRule,
    options: JsonOptions,
) -> Result<RenderedBody, TranscodeError> {
    let selected = rule
        .response_body()
        .and_then(|name| find_field(&response.descriptor(), name));

    let text = match selected {
        None => render(response, options)?,
        Some(field) => match &*response.get_field(&field) {
            Value::Message(inner) if !field.is_list() && !field.is_map() => {
                render(inner, options)?
            }
            _ => {
                // Let the serializer render the field in context, defaults included.
                let full = to_json_value(response, options.emit_defaults(true))?;
                let key = if options.proto_field_names {
                    field.name()
                } else {
                    field.json_name()
                };
                let value = full.get(key).cloned().unwrap_or(serde_json::Value::Null);
                serde_json::to_string(&value).map_err(render_error)?
            }
        },
    };
    Ok(RenderedBody::new(text))
}

fn serialize_options(options: JsonOptions) -> SerializeOptions {
    SerializeOptions::new()
        .skip_default_fields(!options.emit_defaults)
        .use_proto_field_name(options.proto_field_names)
}

fn render(message: &DynamicMessage, options: JsonOptions) -> Result<String, TranscodeError> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::new(&mut buf);
    message
        .serialize_with_options(&mut serializer, &serialize_options(options))
        .map_err(render_error)?;
    String::from_utf8(buf).map_err(render_error)
}

fn to_json_value(
    message: &DynamicMessage,
    options: JsonOptions,
) -> Result<serde_json::Value, TranscodeError> {
    message
        .serialize_with_options(serde_json::value::Serializer, &serialize_options(options))
        .map_err(render_error)
}

fn render_error(err: impl std::fmt::Display) -> TranscodeError {
    TranscodeError::Internal(format!("failed to render response: {err}"))
}
