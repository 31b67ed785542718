//! Error types for request handlers and the command processor.

use thiserror::Error;

/// Error type for handler and routing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The handler asked for the message to be requeued and retried later.
    #[error("deferred: {0}")]
    Defer(String),
    /// The handler failed.
    #[error("handler failed: {0}")]
    Failed(String),
    /// The handler or the routing table is misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// `send` found no handler for the request type.
    #[error("no handler registered for {0}")]
    NoHandler(String),
    /// `send` found more than one handler for the request type.
    #[error("{count} handlers registered for {request_type}, send requires exactly one")]
    MultipleHandlers { request_type: String, count: usize },
    /// An async handler was reached from the blocking dispatch path.
    #[error("handler for {0} is async and cannot run on a blocking pump")]
    AsyncHandler(String),
    /// `publish` collected failures from several handlers.
    #[error("{} handler(s) failed: {}", .0.len(), join(.0))]
    Aggregate(Vec<HandlerError>),
}

fn join(errors: &[HandlerError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl HandlerError {
    /// Whether this error is a programming/configuration defect rather than a
    /// failure worth retrying. Aggregates are configuration errors if any of
    /// their members are.
    pub fn is_configuration(&self) -> bool {
        match self {
            HandlerError::Configuration(_)
            | HandlerError::NoHandler(_)
            | HandlerError::MultipleHandlers { .. }
            | HandlerError::AsyncHandler(_) => true,
            HandlerError::Aggregate(errors) => errors.iter().any(HandlerError::is_configuration),
            HandlerError::Defer(_) | HandlerError::Failed(_) => false,
        }
    }

    /// Whether a handler explicitly asked for a requeue.
    pub fn is_defer(&self) -> bool {
        match self {
            HandlerError::Defer(_) => true,
            HandlerError::Aggregate(errors) => errors.iter().any(HandlerError::is_defer),
            _ => false,
        }
    }

    /// Collapse a list of handler failures: none, one, or an aggregate.
    pub fn aggregate(mut errors: Vec<HandlerError>) -> Option<HandlerError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(HandlerError::Aggregate(errors)),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Failed(err.to_string())
    }
}
