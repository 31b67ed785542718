//! Error types for the dispatcher.

use thiserror::Error;

use crate::channel::ChannelError;
use crate::mapper::MappingError;
use crate::performer::PerformerError;
use crate::subscription::ConfigError;

/// Error type for dispatcher construction and control.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatcherError {
    /// No configured subscription has this name.
    #[error("subscription not found: {0}")]
    SubscriptionNotFound(String),
    /// A subscription names a request type with no registered mapper.
    #[error("no mapper for request type {request_type} (subscription {subscription})")]
    NoMapper {
        subscription: String,
        request_type: String,
    },
    /// No processor was supplied for the subscriptions' pump type.
    #[error("no {0} request processor configured")]
    NoProcessor(String),
    /// Reactor subscriptions need a runtime and none could be provided.
    #[error("no runtime for reactor pumps: {0}")]
    NoRuntime(String),
    /// The supervisor thread could not be started.
    #[error("failed to start dispatcher supervisor: {0}")]
    Spawn(String),
    /// A channel could not be created.
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// A performer could not be started.
    #[error(transparent)]
    Performer(#[from] PerformerError),
    /// A mapper lookup failed.
    #[error(transparent)]
    Mapping(#[from] MappingError),
    /// Subscription configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
