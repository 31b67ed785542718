//! Error types for message pumps.

use thiserror::Error;

use crate::channel::ChannelError;

/// Errors that end a pump loop and fault its job.
///
/// Transient channel failures, unacceptable messages and handler failures
/// never surface here; the pump absorbs them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PumpError {
    /// The envelope, request and handler table do not agree. Not retried.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The channel became unusable (e.g. disposed under a running pump).
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// The worker thread or task could not be started.
    #[error("failed to start pump worker: {0}")]
    Spawn(String),
    /// The worker panicked or was cancelled before reporting an outcome.
    #[error("pump worker aborted: {0}")]
    Aborted(String),
}

impl PumpError {
    /// Whether this is a configuration defect.
    pub fn is_configuration(&self) -> bool {
        matches!(self, PumpError::Configuration(_))
    }
}
