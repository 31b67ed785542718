//! Serializable subscription settings and the dispatcher config document.

use std::collections::HashSet;
use std::io::Read;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// How a subscription's pumps run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePumpType {
    /// One dedicated OS thread per performer, blocking dispatch.
    #[default]
    Thread,
    /// One task per performer on a tokio runtime, suspending dispatch.
    Reactor,
}

/// Settings for one subscription, as read from configuration.
///
/// Durations are in milliseconds. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionSettings {
    pub name: String,
    pub channel_name: String,
    pub routing_key: String,
    /// Name the request mapper is registered under.
    pub request_type: String,
    pub no_of_performers: usize,
    pub timeout_ms: u64,
    /// Maximum delivery attempts including the first; -1 is unlimited.
    pub requeue_count: i32,
    pub requeue_delay_ms: u64,
    /// Unacceptable messages a pump tolerates before stopping; 0 is unlimited.
    pub unacceptable_message_limit: u32,
    pub is_durable: bool,
    pub pump_type: MessagePumpType,
    pub channel_failure_delay_ms: u64,
    pub empty_channel_delay_ms: u64,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            channel_name: String::new(),
            routing_key: String::new(),
            request_type: String::new(),
            no_of_performers: 1,
            timeout_ms: 300,
            requeue_count: -1,
            requeue_delay_ms: 0,
            unacceptable_message_limit: 0,
            is_durable: false,
            pump_type: MessagePumpType::Thread,
            channel_failure_delay_ms: 1000,
            empty_channel_delay_ms: 0,
        }
    }
}

impl SubscriptionSettings {
    /// Check ranges and required names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            subscription: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if self.channel_name.is_empty() {
            return Err(invalid("channel_name is empty"));
        }
        if self.routing_key.is_empty() {
            return Err(invalid("routing_key is empty"));
        }
        if self.request_type.is_empty() {
            return Err(invalid("request_type is empty"));
        }
        if self.no_of_performers == 0 {
            return Err(invalid("no_of_performers must be at least 1"));
        }
        if self.requeue_count < -1 {
            return Err(invalid("requeue_count must be -1 or greater"));
        }
        Ok(())
    }
}

/// The dispatcher's configuration document.
///
/// ```json
/// {
///   "subscriptions": [
///     { "name": "orders", "channel_name": "orders", "routing_key": "orders.placed",
///       "request_type": "OrderPlaced", "no_of_performers": 2, "pump_type": "reactor" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionSettings>,
}

impl DispatcherConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: DispatcherConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let config: DispatcherConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every subscription and reject duplicate names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for settings in &self.subscriptions {
            settings.validate()?;
            if !names.insert(settings.name.as_str()) {
                return Err(ConfigError::Duplicate(settings.name.clone()));
            }
        }
        Ok(())
    }
}
