use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::error::ConfigError;
use super::settings::{MessagePumpType, SubscriptionSettings};
use crate::channel::ChannelFactory;

/// Immutable configuration for one logical subscription.
///
/// A subscription binds validated [`SubscriptionSettings`] to the channel
/// factory its performers create channels from. Build one with
/// [`Subscription::new`] and the `with_*` methods, or from loaded settings
/// with [`Subscription::from_settings`].
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use sourced_dispatch::channel::{InMemoryBus, InMemoryChannelFactory};
/// use sourced_dispatch::subscription::{MessagePumpType, Subscription};
///
/// let factory = Arc::new(InMemoryChannelFactory::new(InMemoryBus::new()));
/// let subscription = Subscription::new("orders", "orders.placed", "OrderPlaced", factory)
///     .with_performers(2)
///     .with_timeout(Duration::from_millis(100))
///     .with_pump_type(MessagePumpType::Reactor)
///     .validated()
///     .unwrap();
///
/// assert_eq!(subscription.channel_name(), "orders");
/// assert_eq!(subscription.no_of_performers(), 2);
/// ```
#[derive(Clone)]
pub struct Subscription {
    settings: SubscriptionSettings,
    channel_factory: Arc<dyn ChannelFactory>,
}

impl Subscription {
    /// Create a subscription with default policy. The channel name defaults
    /// to the subscription name.
    pub fn new(
        name: impl Into<String>,
        routing_key: impl Into<String>,
        request_type: impl Into<String>,
        channel_factory: Arc<dyn ChannelFactory>,
    ) -> Self {
        let name = name.into();
        Self {
            settings: SubscriptionSettings {
                channel_name: name.clone(),
                name,
                routing_key: routing_key.into(),
                request_type: request_type.into(),
                ..Default::default()
            },
            channel_factory,
        }
    }

    /// Bind loaded settings to a channel factory, validating them.
    pub fn from_settings(
        settings: SubscriptionSettings,
        channel_factory: Arc<dyn ChannelFactory>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            settings,
            channel_factory,
        })
    }

    /// Validate a programmatically built subscription.
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.settings.validate()?;
        Ok(self)
    }

    pub fn with_channel_name(mut self, channel_name: impl Into<String>) -> Self {
        self.settings.channel_name = channel_name.into();
        self
    }

    pub fn with_performers(mut self, no_of_performers: usize) -> Self {
        self.settings.no_of_performers = no_of_performers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Maximum delivery attempts including the first; -1 is unlimited.
    pub fn with_requeue_count(mut self, requeue_count: i32) -> Self {
        self.settings.requeue_count = requeue_count;
        self
    }

    pub fn with_requeue_delay(mut self, delay: Duration) -> Self {
        self.settings.requeue_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Unacceptable messages a pump tolerates before stopping; 0 is unlimited.
    pub fn with_unacceptable_message_limit(mut self, limit: u32) -> Self {
        self.settings.unacceptable_message_limit = limit;
        self
    }

    pub fn with_durable(mut self, is_durable: bool) -> Self {
        self.settings.is_durable = is_durable;
        self
    }

    pub fn with_pump_type(mut self, pump_type: MessagePumpType) -> Self {
        self.settings.pump_type = pump_type;
        self
    }

    pub fn with_channel_failure_delay(mut self, delay: Duration) -> Self {
        self.settings.channel_failure_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_empty_channel_delay(mut self, delay: Duration) -> Self {
        self.settings.empty_channel_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn channel_name(&self) -> &str {
        &self.settings.channel_name
    }

    pub fn routing_key(&self) -> &str {
        &self.settings.routing_key
    }

    pub fn request_type(&self) -> &str {
        &self.settings.request_type
    }

    pub fn no_of_performers(&self) -> usize {
        self.settings.no_of_performers
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.settings.timeout_ms)
    }

    pub fn requeue_count(&self) -> i32 {
        self.settings.requeue_count
    }

    pub fn requeue_delay(&self) -> Duration {
        Duration::from_millis(self.settings.requeue_delay_ms)
    }

    pub fn unacceptable_message_limit(&self) -> u32 {
        self.settings.unacceptable_message_limit
    }

    pub fn is_durable(&self) -> bool {
        self.settings.is_durable
    }

    pub fn pump_type(&self) -> MessagePumpType {
        self.settings.pump_type
    }

    pub fn channel_failure_delay(&self) -> Duration {
        Duration::from_millis(self.settings.channel_failure_delay_ms)
    }

    pub fn empty_channel_delay(&self) -> Duration {
        Duration::from_millis(self.settings.empty_channel_delay_ms)
    }

    pub fn channel_factory(&self) -> &Arc<dyn ChannelFactory> {
        &self.channel_factory
    }

    pub fn settings(&self) -> &SubscriptionSettings {
        &self.settings
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
