//! Gateway configuration loaded from YAML.
//!
//! ```yaml
//! listen: 0.0.0.0:8080
//! upstream: http://127.0.0.1:50051
//! # Relative paths are resolved against the config file's directory.
//! descriptor_set: descriptors.bin
//! # Expose only these services; all of them when empty.
//! services:
//!   - demo.UserService
//! log_filter: info,tonic_transcode=debug
//! transcoding:
//!   native_paths: true
//!   max_body_bytes: 4194304
//!   sse_keep_alive_secs: 15
//!   forwarded_headers: [x-tenant]
//!   json:
//!     emit_defaults: false
//!     proto_field_names: false
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::http::HeaderName;
use serde::Deserialize;
use tonic_transcode::TranscodingConfig;

/// Everything the gateway binary needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Address the HTTP server binds to.
    pub listen: SocketAddr,

    /// URI of the gRPC upstream.
    pub upstream: String,

    /// Serialized `FileDescriptorSet` with the exposed services and their imports.
    pub descriptor_set: PathBuf,

    /// Fully-qualified services to expose.
    pub services: Vec<String>,

    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Transcoding behaviour.
    pub transcoding: TranscodingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            upstream: "http://127.0.0.1:50051".to_string(),
            descriptor_set: PathBuf::from("descriptors.bin"),
            services: Vec::new(),
            log_filter: "info".to_string(),
            transcoding: TranscodingConfig::default(),
        }
    }
}

/// Errors while loading a [`GatewayConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid YAML for [`GatewayConfig`].
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// A value parsed but cannot be used.
    #[error("invalid `{field}`: {reason}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl GatewayConfig {
    /// Read and validate a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is unreadable, malformed or invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&content)?;
        if let Some(base) = path.parent() {
            config.descriptor_set = base.join(&config.descriptor_set);
        }
        Ok(config)
    }

    /// Parse and validate YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is malformed or invalid.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml_ng::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot, and normalize header names.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first bad value.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if !(self.upstream.starts_with("http://") || self.upstream.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "upstream",
                reason: format!("`{}` is not an http(s) URI", self.upstream),
            });
        }
        if let Some(service) = self.services.iter().find(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "services",
                reason: format!("empty service name `{service}`"),
            });
        }
        if self.transcoding.max_body_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "transcoding.max_body_bytes",
                reason: "must be positive".to_string(),
            });
        }
        for header in &mut self.transcoding.forwarded_headers {
            let name = HeaderName::from_bytes(header.as_bytes()).map_err(|err| ConfigError::Invalid {
                field: "transcoding.forwarded_headers",
                reason: format!("`{header}`: {err}"),
            })?;
            *header = name.as_str().to_string();
        }
        Ok(())
    }
}
