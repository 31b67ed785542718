//! JSON message mapper backed by serde_json.

use std::any::type_name;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::MappingError;
use super::mapper::MessageMapper;
use crate::message::{Message, MessageHeader, MessageType};
use crate::request::{downcast_ref, request_type_name, Request, RequestKind};

/// Maps JSON message bodies to and from `R`.
pub struct JsonMessageMapper<R> {
    _request: PhantomData<fn() -> R>,
}

impl<R> JsonMessageMapper<R> {
    pub fn new() -> Self {
        Self {
            _request: PhantomData,
        }
    }
}

impl<R> Default for JsonMessageMapper<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Envelope type for a request kind.
pub(crate) fn message_type_for(kind: RequestKind) -> MessageType {
    match kind {
        RequestKind::Command => MessageType::Command,
        RequestKind::Event => MessageType::Event,
    }
}

impl<R> MessageMapper for JsonMessageMapper<R>
where
    R: Request + Serialize + DeserializeOwned,
{
    fn map_to_request(&self, message: &Message) -> Result<Box<dyn Request>, MappingError> {
        let request: R =
            serde_json::from_slice(&message.body).map_err(|e| MappingError::Decode {
                message_id: message.id().to_string(),
                request_type: type_name::<R>().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(request))
    }

    fn map_to_message(&self, request: &dyn Request, topic: &str) -> Result<Message, MappingError> {
        let typed = downcast_ref::<R>(request).ok_or_else(|| MappingError::TypeMismatch {
            expected: type_name::<R>().to_string(),
            found: request_type_name(request).to_string(),
        })?;
        let body = serde_json::to_vec(typed).map_err(|e| MappingError::Encode {
            request_type: type_name::<R>().to_string(),
            reason: e.to_string(),
        })?;
        let header = MessageHeader::new(typed.id(), topic, message_type_for(typed.kind()));
        Ok(Message::new(header, body))
    }
}
