// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! sca-config
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::fmt;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from loading or validating decoder settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested settings file could not be read.
    #[error("settings file not readable: {path}: {reason}")]
    FileNotReadable {
        /// Path that was requested.
        path: String,
        /// Underlying I/O detail.
        reason: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse settings: {reason}")]
    Parse {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("settings validation failed: {reasons:?}")]
    Validation {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The target field lives under the source prefix, so decoding mutates
    /// the subtree it reads from.
    TargetInsideSource {
        /// The configured target field pointer.
        target: String,
    },
    /// A socket path is relative and will resolve against the daemon's
    /// working directory.
    RelativeSocketPath {
        /// The configured path.
        path: String,
    },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::TargetInsideSource { target } => {
                write!(f, "target field '{target}' is inside the source prefix")
            }
            ConfigWarning::RelativeSocketPath { path } => {
                write!(f, "socket path '{path}' is relative to the working directory")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Everything the decoder needs from its surroundings.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DecoderSettings {
    /// Unix stream socket of the policy-monitoring store.
    #[serde(default = "default_store_socket")]
    pub store_socket: PathBuf,

    /// Unix datagram socket of the dump-request sink.
    #[serde(default = "default_dump_socket")]
    pub dump_socket: PathBuf,

    /// JSON pointer under which the agent event arrives.
    #[serde(default = "default_source_prefix")]
    pub source_prefix: String,

    /// JSON pointer of the agent identifier string.
    #[serde(default = "default_agent_id_path")]
    pub agent_id_path: String,

    /// JSON pointer receiving the per-event success boolean.
    #[serde(default = "default_target_field")]
    pub target_field: String,

    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

fn default_store_socket() -> PathBuf {
    PathBuf::from("queue/db/wdb")
}

fn default_dump_socket() -> PathBuf {
    PathBuf::from("queue/alerts/cfgarq")
}

fn default_source_prefix() -> String {
    "/event".to_string()
}

fn default_agent_id_path() -> String {
    "/agent/id".to_string()
}

fn default_target_field() -> String {
    "/decoded/sca".to_string()
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            store_socket: default_store_socket(),
            dump_socket: default_dump_socket(),
            source_prefix: default_source_prefix(),
            agent_id_path: default_agent_id_path(),
            target_field: default_target_field(),
            log_level: None,
        }
    }
}

impl DecoderSettings {
    /// Parse settings from TOML text and validate them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML and
    /// [`ConfigError::Validation`] when a setting is semantically invalid.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let settings: DecoderSettings = toml::from_str(input).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file and validate them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotReadable`] when the file cannot be read,
    /// plus everything [`DecoderSettings::from_toml_str`] can return.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|e| ConfigError::FileNotReadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&input)
    }

    /// Check every setting, accumulating problems instead of short-circuiting.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] listing every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut reasons = Vec::new();

        for (name, pointer) in [
            ("source_prefix", &self.source_prefix),
            ("agent_id_path", &self.agent_id_path),
            ("target_field", &self.target_field),
        ] {
            if !pointer.is_empty() && !pointer.starts_with('/') {
                reasons.push(format!("{name} must be an empty or /-rooted JSON pointer, got '{pointer}'"));
            }
        }
        if self.agent_id_path.is_empty() {
            reasons.push("agent_id_path must not be empty".to_string());
        }
        if self.target_field.is_empty() {
            reasons.push("target_field must not be empty".to_string());
        }
        if self.store_socket.as_os_str().is_empty() {
            reasons.push("store_socket must not be empty".to_string());
        }
        if self.dump_socket.as_os_str().is_empty() {
            reasons.push("dump_socket must not be empty".to_string());
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation { reasons })
        }
    }

    /// Advisory warnings for settings that validate but look wrong.
    #[must_use]
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if !self.source_prefix.is_empty()
            && self
                .target_field
                .strip_prefix(self.source_prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        {
            warnings.push(ConfigWarning::TargetInsideSource {
                target: self.target_field.clone(),
            });
        }
        for path in [&self.store_socket, &self.dump_socket] {
            if path.is_relative() {
                warnings.push(ConfigWarning::RelativeSocketPath {
                    path: path.display().to_string(),
                });
            }
        }
        warnings
    }
}
