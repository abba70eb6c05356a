//! Typed field access on dynamic messages.
//!
//! Field paths are dot-separated (`nested.some_message`). Each segment may be
//! the proto field name or its JSON name. Every intermediate segment must be a
//! singular message field; the leaf decides what can be done with it.
//!
//! Failures are explicit: callers that want to ignore a bad path match on the
//! error instead of receiving an absent value.

use prost::bytes::Bytes;
use prost_reflect::{DynamicMessage, EnumDescriptor, ReflectMessage, FieldDescriptor, Kind, MessageDescriptor, Value};

/// Why a field path cannot be read or written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum FieldAccessError {
    /// The path is empty or has an empty segment.
    #[error("invalid field path `{0}`")]
    InvalidPath(String),

    /// A segment names no field of its message.
    #[error("{message} has no field `{field}`")]
    UnknownField {
        /// Full name of the message searched.
        message: String,
        /// Segment that did not resolve.
        field: String,
    },

    /// The path goes through (or asks for) something other than a singular message.
    #[error("field `{0}` is not a singular message")]
    NotAMessage(String),

    /// The leaf is a message or map and cannot be set from text.
    #[error("field `{0}` does not hold a scalar, enum or bytes value")]
    NotAValue(String),

    /// `set` on a repeated field.
    #[error("field `{0}` is repeated")]
    Repeated(String),

    /// `push` on a singular field.
    #[error("field `{0}` is not repeated")]
    NotRepeated(String),

    /// The text does not convert to the leaf's type.
    #[error(transparent)]
    Resolution(#[from] FieldResolutionError),
}

impl FieldAccessError {
    /// Whether the error is about the shape of the path rather than the value.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::Resolution(_))
    }
}

/// A textual value that does not convert to its field's type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value `{value}` for field `{field}`: {reason}")]
pub struct FieldResolutionError {
    /// Field path as given.
    pub field: String,
    /// Offending text.
    pub value: String,
    /// What was expected.
    pub reason: String,
}

/// Read and write fields by path.
pub trait FieldAccess {
    /// Current value at `path`; unset fields yield their default.
    ///
    /// # Errors
    ///
    /// Structural [`FieldAccessError`]s when the path does not resolve.
    fn get(&self, path: &str) -> Result<Value, FieldAccessError>;

    /// Convert `text` and store it in the singular value field at `path`.
    ///
    /// # Errors
    ///
    /// Structural errors for bad paths, [`FieldAccessError::Resolution`]
    /// when the text does not convert.
    fn set_text(&mut self, path: &str, text: &str) -> Result<(), FieldAccessError>;

    /// Convert `text` and append it to the repeated value field at `path`.
    ///
    /// # Errors
    ///
    /// As for [`FieldAccess::set_text`].
    fn push_text(&mut self, path: &str, text: &str) -> Result<(), FieldAccessError>;

    /// Mutable access to the singular message field at `path`, created if unset.
    ///
    /// # Errors
    ///
    /// Structural errors when the path does not end at a singular message.
    fn message_mut(&mut self, path: &str) -> Result<&mut DynamicMessage, FieldAccessError>;
}

/// Look up one field by proto name, then by JSON name.
#[must_use]
pub fn find_field(message: &MessageDescriptor, name: &str) -> Option<FieldDescriptor> {
    message
        .get_field_by_name(name)
        .or_else(|| message.get_field_by_json_name(name))
}

/// Resolve `path` against a message type, returning the leaf field.
///
/// # Errors
///
/// Structural [`FieldAccessError`]s; the leaf itself is not checked.
pub fn resolve_field(
    message: &MessageDescriptor,
    path: &str,
) -> Result<FieldDescriptor, FieldAccessError> {
    resolve(message, path).map(|(_, leaf)| leaf)
}

fn resolve(
    message: &MessageDescriptor,
    path: &str,
) -> Result<(Vec<FieldDescriptor>, FieldDescriptor), FieldAccessError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(FieldAccessError::InvalidPath(path.to_string()));
    }

    let mut parents = Vec::with_capacity(segments.len() - 1);
    let mut current = message.clone();
    let (leaf, intermediate) = segments
        .split_last()
        .ok_or_else(|| FieldAccessError::InvalidPath(path.to_string()))?;

    for segment in intermediate {
        let field = lookup(&current, segment)?;
        current = match field.kind() {
            Kind::Message(inner) if is_singular(&field) => inner,
            _ => return Err(FieldAccessError::NotAMessage(segment.to_string())),
        };
        parents.push(field);
    }
    Ok((parents, lookup(&current, leaf)?))
}

fn lookup(message: &MessageDescriptor, name: &str) -> Result<FieldDescriptor, FieldAccessError> {
    find_field(message, name).ok_or_else(|| FieldAccessError::UnknownField {
        message: message.full_name().to_string(),
        field: name.to_string(),
    })
}

fn is_singular(field: &FieldDescriptor) -> bool {
    !field.is_list() && !field.is_map()
}

/// Whether a field holds a scalar, enum or bytes value (possibly repeated).
#[must_use]
pub fn is_value_field(field: &FieldDescriptor) -> bool {
    !matches!(field.kind(), Kind::Message(_))
}

fn descend<'m>(
    mut current: &'m mut DynamicMessage,
    parents: &[FieldDescriptor],
) -> Result<&'m mut DynamicMessage, FieldAccessError> {
    for field in parents {
        current = current
            .get_field_mut(field)
            .as_message_mut()
            .ok_or_else(|| FieldAccessError::NotAMessage(field.name().to_string()))?;
    }
    Ok(current)
}

fn value_leaf(
    message: &MessageDescriptor,
    path: &str,
) -> Result<(Vec<FieldDescriptor>, FieldDescriptor), FieldAccessError> {
    let (parents, leaf) = resolve(message, path)?;
    if !is_value_field(&leaf) {
        return Err(FieldAccessError::NotAValue(path.to_string()));
    }
    Ok((parents, leaf))
}

impl FieldAccess for DynamicMessage {
    fn get(&self, path: &str) -> Result<Value, FieldAccessError> {
        let (parents, leaf) = resolve(&self.descriptor(), path)?;
        let mut current = self.clone();
        for field in &parents {
            current = match current.get_field(field).into_owned() {
                Value::Message(inner) => inner,
                _ => return Err(FieldAccessError::NotAMessage(field.name().to_string())),
            };
        }
        Ok(current.get_field(&leaf).into_owned())
    }

    fn set_text(&mut self, path: &str, text: &str) -> Result<(), FieldAccessError> {
        let (parents, leaf) = value_leaf(&self.descriptor(), path)?;
        if !is_singular(&leaf) {
            return Err(FieldAccessError::Repeated(path.to_string()));
        }
        let value = coerce(&leaf, path, text)?;
        descend(self, &parents)?.set_field(&leaf, value);
        Ok(())
    }

    fn push_text(&mut self, path: &str, text: &str) -> Result<(), FieldAccessError> {
        let (parents, leaf) = value_leaf(&self.descriptor(), path)?;
        if !leaf.is_list() {
            return Err(FieldAccessError::NotRepeated(path.to_string()));
        }
        let value = coerce(&leaf, path, text)?;
        descend(self, &parents)?
            .get_field_mut(&leaf)
            .as_list_mut()
            .ok_or_else(|| FieldAccessError::NotRepeated(path.to_string()))?
            .push(value);
        Ok(())
    }

    fn message_mut(&mut self, path: &str) -> Result<&mut DynamicMessage, FieldAccessError> {
        let (mut parents, leaf) = resolve(&self.descriptor(), path)?;
        if !matches!(leaf.kind(), Kind::Message(_)) || !is_singular(&leaf) {
            return Err(FieldAccessError::NotAMessage(path.to_string()));
        }
        parents.push(leaf);
        descend(self, &parents)
    }
}

/// Convert path/query text into a value for `field`.
///
/// Integers are base-10, floats use decimal notation (`NaN` and `Infinity`
/// included), booleans are `true`/`false` in any case, bytes are the UTF-8 of
/// the text and enums take a known number or a case-sensitive value name. An
/// empty enum text selects the enum's first value.
///
/// # Errors
///
/// [`FieldResolutionError`] when the text does not convert.
pub fn coerce(field: &FieldDescriptor, path: &str, text: &str) -> Result<Value, FieldResolutionError> {
    let fail = |reason: &str| FieldResolutionError {
        field: path.to_string(),
        value: text.to_string(),
        reason: reason.to_string(),
    };

    let value = match field.kind() {
        Kind::Double => Value::F64(text.parse().map_err(|_| fail("expected a number"))?),
        Kind::Float => Value::F32(text.parse().map_err(|_| fail("expected a number"))?),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
            Value::I32(text.parse().map_err(|_| fail("expected a 32-bit integer"))?)
        }
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
            Value::I64(text.parse().map_err(|_| fail("expected a 64-bit integer"))?)
        }
        Kind::Uint32 | Kind::Fixed32 => {
            Value::U32(text.parse().map_err(|_| fail("expected an unsigned 32-bit integer"))?)
        }
        Kind::Uint64 | Kind::Fixed64 => {
            Value::U64(text.parse().map_err(|_| fail("expected an unsigned 64-bit integer"))?)
        }
        Kind::Bool => {
            if text.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if text.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                return Err(fail("expected `true` or `false`"));
            }
        }
        Kind::String => Value::String(text.to_string()),
        Kind::Bytes => Value::Bytes(Bytes::copy_from_slice(text.as_bytes())),
        Kind::Enum(descriptor) => Value::EnumNumber(
            enum_number(&descriptor, text)
                .ok_or_else(|| fail(&format!("unknown value of enum {}", descriptor.full_name())))?,
        ),
        Kind::Message(message) => {
            return Err(fail(&format!("{} is a message", message.full_name())));
        }
    };
    Ok(value)
}

fn enum_number(descriptor: &EnumDescriptor, text: &str) -> Option<i32> {
    if text.trim().is_empty() {
        return Some(descriptor.default_value().number());
    }
    match text.parse::<i32>() {
        Ok(number) => descriptor.get_value(number).map(|v| v.number()),
        Err(_) => descriptor.get_value_by_name(text).map(|v| v.number()),
    }
}
