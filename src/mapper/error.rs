//! Error types for message mapping.

use thiserror::Error;

/// Error raised when converting between messages and typed requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// No mapper registered for the request type.
    #[error("no message mapper registered for request type {0}")]
    NoMapper(String),
    /// The message body could not be decoded into the request type.
    #[error("failed to map message {message_id} to {request_type}: {reason}")]
    Decode {
        message_id: String,
        request_type: String,
        reason: String,
    },
    /// The request could not be encoded into a message body.
    #[error("failed to encode {request_type}: {reason}")]
    Encode { request_type: String, reason: String },
    /// The mapper was handed a request of another type.
    #[error("mapper for {expected} cannot map {found}")]
    TypeMismatch { expected: String, found: String },
}
