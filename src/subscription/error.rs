//! Error types for subscription configuration.

use thiserror::Error;

/// Error type for loading or validating subscription configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A subscription setting is out of range or missing.
    #[error("invalid subscription {subscription}: {reason}")]
    Invalid {
        subscription: String,
        reason: String,
    },
    /// Two subscriptions share a name.
    #[error("duplicate subscription name: {0}")]
    Duplicate(String),
    /// The configuration document could not be parsed.
    #[error("config parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
