//! Message envelope: header plus opaque body.

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of envelope read from a channel.
///
/// `Command`, `Event` and `Document` carry application payloads. `Quit` is the
/// in-band poison pill that ends a message pump. `None` marks an empty receive
/// and `Unacceptable` marks a transport payload the channel could not parse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// The channel could not read the incoming payload.
    Unacceptable,
    /// No message (empty channel).
    #[default]
    None,
    /// Point-to-point request with exactly one handler.
    Command,
    /// Notification with zero or more handlers.
    Event,
    /// Notification carrying the changed state, routed like an event.
    Document,
    /// Poison pill that ends a message pump.
    Quit,
}

impl MessageType {
    /// Whether this envelope carries an application request.
    pub fn is_serviceable(&self) -> bool {
        matches!(
            self,
            MessageType::Command | MessageType::Event | MessageType::Document
        )
    }
}

/// Envelope header.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Unique identifier (empty for the quit pill)
    pub id: String,
    /// Topic / routing key the message was sent to
    pub topic: String,
    /// Envelope kind
    pub message_type: MessageType,
    /// When the message was created
    pub timestamp: SystemTime,
    /// Number of failed dispatch attempts so far
    pub handled_count: u32,
    /// Delay applied by the last requeue, in milliseconds
    pub delayed_ms: u64,
    /// Optional correlation identifier
    pub correlation_id: Option<String>,
    /// Body content type (e.g. "application/json")
    pub content_type: String,
    /// Additional transport headers
    pub bag: BTreeMap<String, String>,
}

impl MessageHeader {
    /// Create a header for a message of the given type.
    pub fn new(id: impl Into<String>, topic: impl Into<String>, message_type: MessageType) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            message_type,
            timestamp: SystemTime::now(),
            handled_count: 0,
            delayed_ms: 0,
            correlation_id: None,
            content_type: "application/json".to_string(),
            bag: BTreeMap::new(),
        }
    }
}

/// A message read from or written to a channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub header: MessageHeader,
    /// Serialized payload (typically JSON or binary)
    pub body: Vec<u8>,
}

impl Message {
    /// Create a message from a header and a body.
    pub fn new(header: MessageHeader, body: Vec<u8>) -> Self {
        Self { header, body }
    }

    /// Create a command message with a generated id.
    pub fn command(topic: impl Into<String>, body: Vec<u8>) -> Self {
        Self::new(
            MessageHeader::new(Uuid::new_v4().to_string(), topic, MessageType::Command),
            body,
        )
    }

    /// Create an event message with a generated id.
    pub fn event(topic: impl Into<String>, body: Vec<u8>) -> Self {
        Self::new(
            MessageHeader::new(Uuid::new_v4().to_string(), topic, MessageType::Event),
            body,
        )
    }

    /// Create a document message with a generated id.
    pub fn document(topic: impl Into<String>, body: Vec<u8>) -> Self {
        Self::new(
            MessageHeader::new(Uuid::new_v4().to_string(), topic, MessageType::Document),
            body,
        )
    }

    /// The poison pill: empty id, type `Quit`, empty body.
    pub fn quit(topic: impl Into<String>) -> Self {
        Self::new(MessageHeader::new("", topic, MessageType::Quit), Vec::new())
    }

    /// The empty-receive marker.
    pub fn none() -> Self {
        Self::new(MessageHeader::new("", "", MessageType::None), Vec::new())
    }

    /// A message the transport could not parse. The raw bytes are kept as body.
    pub fn unacceptable(id: impl Into<String>, topic: impl Into<String>, raw: Vec<u8>) -> Self {
        Self::new(MessageHeader::new(id, topic, MessageType::Unacceptable), raw)
    }

    /// Create a message with a string body.
    pub fn with_string_body(
        id: impl Into<String>,
        topic: impl Into<String>,
        message_type: MessageType,
        body: impl Into<String>,
    ) -> Self {
        Self::new(
            MessageHeader::new(id, topic, message_type),
            body.into().into_bytes(),
        )
    }

    pub fn id(&self) -> &str {
        &self.header.id
    }

    pub fn topic(&self) -> &str {
        &self.header.topic
    }

    pub fn message_type(&self) -> MessageType {
        self.header.message_type
    }

    /// True for the poison pill (`Quit`, empty id).
    pub fn is_quit(&self) -> bool {
        self.header.message_type == MessageType::Quit && self.header.id.is_empty()
    }

    /// Add an entry to the header bag.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.bag.insert(key.into(), value.into());
        self
    }

    /// Set the correlation id.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.header.correlation_id = Some(correlation_id.into());
        self
    }

    /// Record one more failed delivery attempt.
    pub fn update_handled_count(&mut self) {
        self.header.handled_count = self.header.handled_count.saturating_add(1);
    }

    /// Whether the delivery attempts have reached `requeue_count`.
    ///
    /// A negative `requeue_count` means unlimited and never reaches.
    pub fn handled_count_reached(&self, requeue_count: i32) -> bool {
        requeue_count >= 0 && i64::from(self.header.handled_count) >= i64::from(requeue_count)
    }

    /// Get the body as a string (if valid UTF-8).
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Create a message with a bitcode-serialized body.
    #[cfg(feature = "bitcode")]
    pub fn encode<T: Serialize>(
        id: impl Into<String>,
        topic: impl Into<String>,
        message_type: MessageType,
        payload: &T,
    ) -> Result<Self, bitcode::Error> {
        let bytes = bitcode::serialize(payload)?;
        let mut header = MessageHeader::new(id, topic, message_type);
        header.content_type = "application/x-bitcode".to_string();
        Ok(Self::new(header, bytes))
    }

    /// Decode the body from bitcode binary format.
    #[cfg(feature = "bitcode")]
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, bitcode::Error> {
        bitcode::deserialize(&self.body)
    }
}
