//! Channel traits: the transport-agnostic source/sink of messages for one
//! subscription worker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::error::ChannelError;
use crate::message::Message;
use crate::subscription::Subscription;

/// Operations shared by blocking and suspending channels.
pub trait ChannelControl: Send + Sync {
    /// Channel name.
    fn name(&self) -> &str;

    /// Routing key the channel consumes from.
    fn routing_key(&self) -> &str;

    /// Stop yielding messages: a pending or later receive returns the quit
    /// pill, so the pump reading this channel exits. Idempotent.
    fn stop(&self);

    /// Release transport resources. Idempotent.
    fn dispose(&self);
}

/// A blocking channel, read by thread pumps.
///
/// Implementations might include:
/// - `InMemoryChannel` - For testing and single-process scenarios
/// - `RabbitMqChannel`, `SqsChannel`, `KafkaChannel` (external)
pub trait Channel: ChannelControl {
    /// Receive the next message, blocking up to `timeout`.
    ///
    /// `Ok(None)` means the timeout elapsed with no message.
    fn receive(&self, timeout: Duration) -> Result<Option<Message>, ChannelError>;

    /// Acknowledge a message, removing it from the channel.
    fn acknowledge(&self, message: &Message) -> Result<(), ChannelError>;

    /// Return a message to the channel, visible again after `delay`.
    fn requeue(&self, message: &Message, delay: Duration) -> Result<bool, ChannelError>;

    /// Reject a message. Dead-lettering is up to the transport.
    fn reject(&self, message: &Message) -> Result<bool, ChannelError>;

    /// Remove all messages.
    fn purge(&self) -> Result<(), ChannelError>;
}

/// A suspending channel, read by reactor pumps.
#[async_trait]
pub trait AsyncChannel: ChannelControl {
    /// Receive the next message, suspending up to `timeout`.
    async fn receive_async(&self, timeout: Duration) -> Result<Option<Message>, ChannelError>;

    /// Acknowledge a message, removing it from the channel.
    async fn acknowledge_async(&self, message: &Message) -> Result<(), ChannelError>;

    /// Return a message to the channel, visible again after `delay`.
    async fn requeue_async(&self, message: &Message, delay: Duration) -> Result<bool, ChannelError>;

    /// Reject a message.
    async fn reject_async(&self, message: &Message) -> Result<bool, ChannelError>;

    /// Remove all messages.
    async fn purge_async(&self) -> Result<(), ChannelError>;
}

/// Creates a fresh channel for each performer of a subscription.
pub trait ChannelFactory: Send + Sync {
    /// Create a blocking channel for a thread pump.
    fn create_channel(&self, subscription: &Subscription) -> Result<Arc<dyn Channel>, ChannelError>;

    /// Create a suspending channel for a reactor pump.
    fn create_async_channel(
        &self,
        subscription: &Subscription,
    ) -> Result<Arc<dyn AsyncChannel>, ChannelError> {
        Err(ChannelError::Unsupported(format!(
            "{} has no async channel",
            subscription.channel_name()
        )))
    }
}
