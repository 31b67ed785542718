//! Subscriptions: immutable configuration for how many workers consume from a
//! channel and under what retry and limit policy.
//!
//! Settings load from JSON through [`DispatcherConfig`]; a [`Subscription`]
//! binds settings to the [`ChannelFactory`](crate::channel::ChannelFactory)
//! its performers draw channels from. Subscriptions are never mutated by the
//! dispatcher once configured.

mod error;
mod settings;
#[allow(clippy::module_inception)]
mod subscription;

pub use error::ConfigError;
pub use settings::{DispatcherConfig, MessagePumpType, SubscriptionSettings};
pub use subscription::Subscription;
