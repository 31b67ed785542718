//! Message envelope types.
//!
//! A [`Message`] is the wire-level unit read from a channel: a
//! [`MessageHeader`] (id, topic, type, timestamp, delivery attempts) and an
//! opaque body. The header's [`MessageType`] decides how a message pump
//! routes the envelope:
//!
//! ```text
//! Command            -> send (exactly one handler)
//! Event / Document   -> publish (zero or more handlers)
//! Quit (empty id)    -> end the pump loop
//! None               -> empty receive, loop again
//! Unacceptable       -> acknowledge and count against the poison limit
//! ```

mod message;

pub use message::{Message, MessageHeader, MessageType};
