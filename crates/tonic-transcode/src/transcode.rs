//! Request transcoding: path variables, query parameters and a JSON body merged
//! into one request message.
//!
//! Sources are applied in a fixed order, later ones overwriting earlier ones:
//!
//! 1. query parameters (only when the body selector is empty or `*`)
//! 2. the JSON body, as directed by the body selector
//! 3. path variables, always at the top level of the message
//!
//! The body is merged as protobuf: a body value equal to its field's default
//! (`""`, `0`, `false`) is indistinguishable from an absent one and does not
//! clear a value set from the query string.

use std::collections::BTreeMap;

use prost::bytes::Bytes;
use prost_reflect::{DeserializeOptions, DynamicMessage, MessageDescriptor, ReflectMessage};

use crate::access::{FieldAccess, FieldAccessError};
use crate::route::{BodySelector, PathVariables, RouteRule};
use crate::runtime::TranscodeError;

/// Query parameters, each key with its values in order of appearance.
pub type QueryParams = BTreeMap<String, Vec<String>>;

/// Everything taken from one HTTP request to build its RPC request message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestVariable {
    /// Raw request body.
    pub body: Bytes,
    /// Decoded query parameters.
    pub query: QueryParams,
    /// Variables captured by the path template.
    pub path_variables: PathVariables,
}

impl RequestVariable {
    /// Bundle the parts of a request; `query` is the raw query string, if any.
    #[must_use]
    pub fn new(body: Bytes, query: Option<&str>, path_variables: PathVariables) -> Self {
        Self {
            body,
            query: query.map(parse_query).unwrap_or_default(),
            path_variables,
        }
    }
}

/// Decode an `application/x-www-form-urlencoded` query string.
#[must_use]
pub fn parse_query(query: &str) -> QueryParams {
    let mut params = QueryParams::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        params
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    params
}

/// Build the request message for `rule` from `input`.
///
/// # Errors
///
/// [`TranscodeError::BodyParse`] for a body that is not JSON for its target,
/// or a body selector naming something other than a singular message field.
/// [`TranscodeError::FieldResolution`] for query or path values that do not
/// convert to their field's type. Query parameters that do not name a value
/// field are skipped.
pub fn build_request(
    rule: &RouteRule,
    input: &RequestVariable,
) -> Result<DynamicMessage, TranscodeError> {
    transcode(rule.rpc().input(), rule.body(), input)
}

fn transcode(
    descriptor: MessageDescriptor,
    selector: &BodySelector,
    input: &RequestVariable,
) -> Result<DynamicMessage, TranscodeError> {
    let mut message = DynamicMessage::new(descriptor);

    if matches!(selector, BodySelector::None | BodySelector::Whole) {
        for (key, values) in &input.query {
            apply_query_param(&mut message, key, values)?;
        }
    }

    if !is_blank(&input.body) {
        match selector {
            BodySelector::None => {}
            BodySelector::Whole => merge_json(&mut message, &input.body)?,
            BodySelector::Field(field) => {
                let target = message.message_mut(field).map_err(|err| {
                    TranscodeError::BodyParse(format!("cannot map body to `{field}`: {err}"))
                })?;
                merge_json(target, &input.body)?;
            }
        }
    }

    for (name, value) in &input.path_variables {
        match message.set_text(name, value) {
            Ok(()) => {}
            Err(FieldAccessError::Resolution(err)) => return Err(err.into()),
            Err(err) => tracing::debug!(variable = %name, %err, "ignoring path variable"),
        }
    }

    Ok(message)
}

fn apply_query_param(
    message: &mut DynamicMessage,
    key: &str,
    values: &[String],
) -> Result<(), TranscodeError> {
    let repeated = crate::access::resolve_field(&message.descriptor(), key)
        .is_ok_and(|field| field.is_list());
    let result = if repeated {
        values.iter().try_for_each(|value| message.push_text(key, value))
    } else {
        values
            .first()
            .map_or(Ok(()), |value| message.set_text(key, value))
    };

    match result {
        Ok(()) => Ok(()),
        Err(FieldAccessError::Resolution(err)) => Err(err.into()),
        Err(err) => {
            tracing::debug!(param = %key, %err, "ignoring query parameter");
            Ok(())
        }
    }
}

/// Parse `body` as JSON for the type of `target` and merge it in.
fn merge_json(target: &mut DynamicMessage, body: &[u8]) -> Result<(), TranscodeError> {
    let parsed = parse_json(target.descriptor(), body)?;
    prost::Message::merge(target, prost::Message::encode_to_vec(&parsed).as_slice())
        .map_err(|err| TranscodeError::Internal(format!("failed to merge request body: {err}")))
}

/// Parse a JSON document into a message of type `descriptor`. Unknown fields are ignored.
///
/// # Errors
///
/// [`TranscodeError::BodyParse`] when the text is not valid JSON for the type.
pub fn parse_json(descriptor: MessageDescriptor, body: &[u8]) -> Result<DynamicMessage, TranscodeError> {
    let options = DeserializeOptions::new().deny_unknown_fields(false);
    let mut deserializer = serde_json::Deserializer::from_slice(body);
    let message = DynamicMessage::deserialize_with_options(descriptor, &mut deserializer, &options)
        .map_err(|err| TranscodeError::BodyParse(err.to_string()))?;
    deserializer
        .end()
        .map_err(|err| TranscodeError::BodyParse(err.to_string()))?;
    Ok(message)
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}
