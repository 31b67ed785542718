//! Bitcode message mapper for compact binary bodies.

use std::any::type_name;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::MappingError;
use super::json::message_type_for;
use super::mapper::MessageMapper;
use crate::message::Message;
use crate::request::{downcast_ref, request_type_name, Request};

/// Maps bitcode-encoded message bodies to and from `R`.
pub struct BitcodeMessageMapper<R> {
    _request: PhantomData<fn() -> R>,
}

impl<R> BitcodeMessageMapper<R> {
    pub fn new() -> Self {
        Self {
            _request: PhantomData,
        }
    }
}

impl<R> Default for BitcodeMessageMapper<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> MessageMapper for BitcodeMessageMapper<R>
where
    R: Request + Serialize + DeserializeOwned,
{
    fn map_to_request(&self, message: &Message) -> Result<Box<dyn Request>, MappingError> {
        let request: R = message.decode().map_err(|e| MappingError::Decode {
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
        Message::encode(typed.id(), topic, message_type_for(typed.kind()), typed).map_err(|e| {
            MappingError::Encode {
                request_type: type_name::<R>().to_string(),
                reason: e.to_string(),
            }
        })
    }
}
