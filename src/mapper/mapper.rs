//! Message mapper trait and registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::error::MappingError;
use crate::message::Message;
use crate::request::Request;

/// Converts a message body to and from a typed request.
///
/// Implementations might include:
/// - `JsonMessageMapper` - serde_json bodies (included)
/// - `BitcodeMessageMapper` - bitcode binary bodies (included, `bitcode` feature)
/// - schema-registry or cloud-events mappers (external)
pub trait MessageMapper: Send + Sync {
    /// Decode the message body into a request.
    fn map_to_request(&self, message: &Message) -> Result<Box<dyn Request>, MappingError>;

    /// Encode a request into a message for the given topic.
    fn map_to_message(&self, request: &dyn Request, topic: &str) -> Result<Message, MappingError>;
}

/// Message mappers keyed by request type name.
///
/// The name is the `request_type` a subscription is configured with.
///
/// ## Example
///
/// ```ignore
/// let mappers = MessageMapperRegistry::new()
///     .json::<PlaceOrder>("place_order")
///     .register("order_placed", Arc::new(MyMapper));
/// ```
#[derive(Clone, Default)]
pub struct MessageMapperRegistry {
    mappers: HashMap<String, Arc<dyn MessageMapper>>,
}

impl MessageMapperRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mapper for the request type name.
    pub fn register(mut self, request_type: impl Into<String>, mapper: Arc<dyn MessageMapper>) -> Self {
        self.mappers.insert(request_type.into(), mapper);
        self
    }

    /// Register a JSON mapper for `R` under the request type name.
    pub fn json<R>(self, request_type: impl Into<String>) -> Self
    where
        R: Request + serde::Serialize + serde::de::DeserializeOwned,
    {
        self.register(request_type, Arc::new(super::JsonMessageMapper::<R>::new()))
    }

    /// Register a bitcode mapper for `R` under the request type name.
    #[cfg(feature = "bitcode")]
    pub fn bitcode<R>(self, request_type: impl Into<String>) -> Self
    where
        R: Request + serde::Serialize + serde::de::DeserializeOwned,
    {
        self.register(request_type, Arc::new(super::BitcodeMessageMapper::<R>::new()))
    }

    /// Look up the mapper for a request type name.
    pub fn get(&self, request_type: &str) -> Result<Arc<dyn MessageMapper>, MappingError> {
        self.mappers
            .get(request_type)
            .cloned()
            .ok_or_else(|| MappingError::NoMapper(request_type.to_string()))
    }

    /// Whether a mapper is registered for the request type name.
    pub fn contains(&self, request_type: &str) -> bool {
        self.mappers.contains_key(request_type)
    }

    /// Number of registered mappers.
    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}

impl fmt::Debug for MessageMapperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.mappers.keys().collect();
        names.sort();
        f.debug_struct("MessageMapperRegistry")
            .field("request_types", &names)
            .finish()
    }
}
