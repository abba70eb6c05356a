//! `google.api.http` path templates: parsing and matching.
//!
//! Supported syntax is the single-segment subset:
//!
//! ```text
//! /v1/shelves/{shelf}/books/{book=*}/*:archive
//! ```
//!
//! `{name}` and `{name=*}` bind one segment, `*` matches one segment without
//! binding, and an optional trailing `:verb` must be matched literally.
//! Multi-segment forms (`**`, `{name=shelves/*}`) are rejected at parse time.

use std::collections::BTreeMap;
use std::fmt;

use percent_encoding::percent_decode_str;

/// Path variables captured by a successful match, keyed by variable name.
pub type PathVariables = BTreeMap<String, String>;

/// Problems found while parsing a path template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TemplateError {
    /// Templates are absolute.
    #[error("path template `{0}` must start with '/'")]
    MissingLeadingSlash(String),

    /// `//` or a trailing `/` before the verb.
    #[error("path template `{0}` contains an empty segment")]
    EmptySegment(String),

    /// `{` without `}` or the other way around.
    #[error("path template `{0}` has unbalanced braces")]
    UnbalancedBraces(String),

    /// Syntax outside the supported single-segment subset.
    #[error("unsupported segment `{segment}` in path template `{template}`")]
    Unsupported {
        /// Full template text.
        template: String,
        /// Offending segment.
        segment: String,
    },

    /// The same variable is bound twice.
    #[error("variable `{variable}` appears twice in path template `{template}`")]
    DuplicateVariable {
        /// Full template text.
        template: String,
        /// Repeated variable name.
        variable: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
    Wildcard,
}

/// A parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
    verb: Option<String>,
}

impl PathTemplate {
    /// Parse a template such as `/v1/items/{id}:cancel`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] for malformed or unsupported templates.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        if !raw.starts_with('/') {
            return Err(TemplateError::MissingLeadingSlash(raw.to_string()));
        }

        let (path, verb) = split_verb(raw)?;
        let mut segments = Vec::new();
        let trimmed = path.trim_matches('/');
        if !trimmed.is_empty() {
            for part in trimmed.split('/') {
                segments.push(parse_segment(raw, part)?);
            }
        }

        let mut seen = Vec::new();
        for segment in &segments {
            if let Segment::Variable(name) = segment {
                if seen.contains(&name) {
                    return Err(TemplateError::DuplicateVariable {
                        template: raw.to_string(),
                        variable: name.clone(),
                    });
                }
                seen.push(name);
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            verb: verb.map(str::to_string),
        })
    }

    /// The template text as declared.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Custom verb, without the leading `:`.
    #[must_use]
    pub fn verb(&self) -> Option<&str> {
        self.verb.as_deref()
    }

    /// Names of the bound variables, in template order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Match a raw request path, returning the percent-decoded variables.
    ///
    /// Leading and trailing slashes are ignored. Only the last segment may
    /// carry a `:verb` suffix, and it must be the template's verb; a `:` in
    /// any earlier segment is ordinary segment text.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<PathVariables> {
        let trimmed = path.trim_matches('/');
        let last = trimmed.rsplit('/').next()?;
        let body = match (self.verb.as_deref(), last.rsplit_once(':')) {
            (Some(verb), Some((_, suffix))) if suffix == verb => {
                &trimmed[..trimmed.len() - suffix.len() - 1]
            }
            (None, None) => trimmed,
            _ => return None,
        };

        let parts: Vec<&str> = if body.is_empty() {
            Vec::new()
        } else {
            body.split('/').collect()
        };
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut variables = PathVariables::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Wildcard => {
                    if part.is_empty() {
                        return None;
                    }
                }
                Segment::Variable(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    let value = percent_decode_str(part).decode_utf8_lossy().into_owned();
                    variables.insert(name.clone(), value);
                }
            }
        }
        Some(variables)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split off a trailing `:verb` that sits after the last top-level `/`.
fn split_verb(raw: &str) -> Result<(&str, Option<&str>), TemplateError> {
    let mut depth = 0_i32;
    let mut colon = None;
    for (i, ch) in raw.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return Err(TemplateError::UnbalancedBraces(raw.to_string()));
                }
            }
            '/' if depth == 0 => colon = None,
            ':' if depth == 0 && colon.is_none() => colon = Some(i),
            _ => {}
        }
    }
    if depth != 0 {
        return Err(TemplateError::UnbalancedBraces(raw.to_string()));
    }

    match colon {
        Some(i) => {
            let verb = &raw[i + 1..];
            if verb.is_empty() {
                return Err(TemplateError::Unsupported {
                    template: raw.to_string(),
                    segment: ":".to_string(),
                });
            }
            let path = &raw[..i];
            if path.len() > 1 && path.ends_with('/') {
                return Err(TemplateError::EmptySegment(raw.to_string()));
            }
            Ok((path, Some(verb)))
        }
        None => Ok((raw, None)),
    }
}

fn parse_segment(template: &str, part: &str) -> Result<Segment, TemplateError> {
    let unsupported = || TemplateError::Unsupported {
        template: template.to_string(),
        segment: part.to_string(),
    };

    if part.is_empty() {
        return Err(TemplateError::EmptySegment(template.to_string()));
    }
    if part == "*" {
        return Ok(Segment::Wildcard);
    }
    if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
        let name = match inner.split_once('=') {
            Some((name, "*")) => name,
            Some(_) => return Err(unsupported()),
            None => inner,
        };
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        return if valid {
            Ok(Segment::Variable(name.to_string()))
        } else {
            Err(unsupported())
        };
    }
    if part.contains(['{', '}', '*']) {
        return Err(unsupported());
    }
    Ok(Segment::Literal(part.to_string()))
}
