//! Core error types for geotick-core.
//!
//! The controller itself has no fatal path: position-source errors are
//! forwarded to the consumer and misuse is absorbed. The types here cover the
//! forwarded source error and the fallible edges around the controller
//! (configuration files and scenario scripts).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type for geotick-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Scenario loading or validation errors
    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error reported by a position source.
///
/// Forwarded verbatim to the consumer; never changes controller state.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum LocationError {
    /// The user or system denied access to location services
    #[error("location access denied")]
    Denied,

    /// The source could not determine a position right now
    #[error("location currently unknown")]
    LocationUnknown,

    /// A network-assisted lookup failed
    #[error("network error while resolving location")]
    Network,

    /// Any other source-specific failure
    #[error("{0}")]
    Other(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not name a configuration field
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Scenario-specific errors.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// Scenario file could not be read
    #[error("Failed to read scenario {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Scenario file could not be parsed
    #[error("Failed to parse scenario {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// File extension is neither `.toml` nor `.json`
    #[error("Unsupported scenario format: {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    /// Scenario content is structurally valid but unusable
    #[error("Invalid scenario: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_error_serializes_with_kind_tag() {
        let json = serde_json::to_value(LocationError::Other("gps off".into())).unwrap();
        assert_eq!(json["kind"], "other");
        assert_eq!(json["message"], "gps off");

        let parsed: LocationError = serde_json::from_str(r#"{"kind":"denied"}"#).unwrap();
        assert_eq!(parsed, LocationError::Denied);
    }

    #[test]
    fn config_error_converts_into_core_error() {
        let err: CoreError = ConfigError::UnknownKey("controller.nope".into()).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: unknown config key: controller.nope"
        );
    }
}
