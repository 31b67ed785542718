//! Message mappers: converting message bodies to typed requests and back.
//!
//! Each subscription names a `request_type`; the dispatcher resolves the
//! mapper for that name from a [`MessageMapperRegistry`] when it creates a
//! consumer. A mapping failure marks the message as unacceptable: the pump
//! acknowledges it and counts it against the subscription's limit.

#[cfg(feature = "bitcode")]
mod bitcode;
mod error;
mod json;
#[allow(clippy::module_inception)]
mod mapper;

#[cfg(feature = "bitcode")]
pub use self::bitcode::BitcodeMessageMapper;
pub use error::MappingError;
pub use json::JsonMessageMapper;
pub use mapper::{MessageMapper, MessageMapperRegistry};
