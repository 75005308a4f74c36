//! Error types for configuration loading and validation

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading or validating a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML
    #[error("failed to parse configuration: {source}")]
    ParseYaml {
        #[source]
        source: serde_yaml::Error,
    },

    /// A value is out of range or inconsistent with the rest of the config
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// A switch-group actuator was declared without any member
    #[error("switch group actuator has no member entities")]
    EmptySwitchGroup,
}
