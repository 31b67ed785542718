//! Error types for channel operations.

use thiserror::Error;

/// Error type for channel operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The transport is temporarily unreachable. Pumps retry these.
    #[error("channel failure: {0}")]
    Failure(String),
    /// The channel has been disposed.
    #[error("channel {0} is disposed")]
    Disposed(String),
    /// The channel factory cannot build the requested channel flavour.
    #[error("channel not supported: {0}")]
    Unsupported(String),
    /// Other error.
    #[error("channel error: {0}")]
    Other(String),
}

impl ChannelError {
    /// Whether the error is a transient transport failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChannelError::Failure(_))
    }
}
