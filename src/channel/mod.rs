//! Channels: the transport seam between a broker and a message pump.
//!
//! ```text
//! ┌──────────────┐  create_channel   ┌─────────────┐  receive   ┌─────────────┐
//! │ChannelFactory│ ────────────────▶ │   Channel   │ ─────────▶ │ MessagePump │
//! └──────────────┘                   └─────────────┘ ◀───────── └─────────────┘
//!                                                   ack/requeue/reject
//! ```
//!
//! A channel is owned by exactly one performer. `stop()` makes the pump
//! reading it see a quit message and exit; `dispose()` releases it.

#[allow(clippy::module_inception)]
mod channel;
mod error;
mod in_memory;

pub use channel::{AsyncChannel, Channel, ChannelControl, ChannelFactory};
pub use error::ChannelError;
pub use in_memory::{InMemoryBus, InMemoryChannel, InMemoryChannelFactory};
