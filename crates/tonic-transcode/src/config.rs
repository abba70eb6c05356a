//! Gateway behaviour knobs.
//!
//! Every field has a default, so an empty YAML/JSON object deserializes into
//! [`TranscodingConfig::default`]. In Rust, use the builder methods:
//!
//! ```
//! use tonic_transcode::TranscodingConfig;
//!
//! let config = TranscodingConfig::new()
//!     .native_paths(true)
//!     .max_body_bytes(64 * 1024)
//!     .forward_header("x-tenant");
//! assert!(config.native_paths);
//! ```

use std::time::Duration;

use serde::Deserialize;

/// Default request body limit: 4 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Default SSE keep-alive interval in seconds.
pub const DEFAULT_SSE_KEEP_ALIVE_SECS: u64 = 15;

/// Runtime configuration of a [`Gateway`](crate::Gateway).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TranscodingConfig {
    /// Also expose `POST /{service}/{method}` for methods that carry an HTTP rule.
    pub native_paths: bool,

    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,

    /// Interval between SSE keep-alive comments; `0` disables them.
    pub sse_keep_alive_secs: u64,

    /// Request headers forwarded as metadata in addition to
    /// [`FORWARDED_HEADERS`](crate::FORWARDED_HEADERS).
    pub forwarded_headers: Vec<String>,

    /// JSON rendering options.
    pub json: JsonOptions,
}

/// How response messages are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct JsonOptions {
    /// Print fields that hold their default value.
    pub emit_defaults: bool,

    /// Use the proto field names (`some_field`) instead of JSON names (`someField`).
    pub proto_field_names: bool,
}

impl JsonOptions {
    /// Toggle printing of default-valued fields.
    #[must_use]
    pub fn emit_defaults(mut self, enabled: bool) -> Self {
        self.emit_defaults = enabled;
        self
    }

    /// Toggle proto field names as JSON keys.
    #[must_use]
    pub fn proto_field_names(mut self, enabled: bool) -> Self {
        self.proto_field_names = enabled;
        self
    }
}

impl Default for TranscodingConfig {
    fn default() -> Self {
        Self {
            native_paths: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            sse_keep_alive_secs: DEFAULT_SSE_KEEP_ALIVE_SECS,
            forwarded_headers: Vec::new(),
            json: JsonOptions::default(),
        }
    }
}

impl TranscodingConfig {
    /// Configuration with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle the default `POST /{service}/{method}` route for annotated methods.
    #[must_use]
    pub fn native_paths(mut self, enabled: bool) -> Self {
        self.native_paths = enabled;
        self
    }

    /// Set the request body limit in bytes.
    #[must_use]
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Set the SSE keep-alive interval; `0` disables keep-alive comments.
    #[must_use]
    pub fn sse_keep_alive_secs(mut self, secs: u64) -> Self {
        self.sse_keep_alive_secs = secs;
        self
    }

    /// Forward one more request header to the upstream call.
    #[must_use]
    pub fn forward_header(mut self, name: impl Into<String>) -> Self {
        self.forwarded_headers.push(name.into().to_ascii_lowercase());
        self
    }

    /// Replace the JSON rendering options.
    #[must_use]
    pub fn json(mut self, json: JsonOptions) -> Self {
        self.json = json;
        self
    }

    /// Keep-alive interval, or `None` when disabled.
    #[must_use]
    pub fn sse_keep_alive(&self) -> Option<Duration> {
        (self.sse_keep_alive_secs > 0).then(|| Duration::from_secs(self.sse_keep_alive_secs))
    }
}
