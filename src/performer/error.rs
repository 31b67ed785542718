//! Error types for performers and consumers.

use thiserror::Error;

use crate::pump::PumpError;

/// Error type for performer operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PerformerError {
    /// `run()` was called on a performer whose pump has already been launched.
    #[error("performer for {0} is already running")]
    AlreadyRunning(String),
    /// The pump could not be launched.
    #[error(transparent)]
    Pump(#[from] PumpError),
}
