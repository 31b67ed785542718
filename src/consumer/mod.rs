//! Consumers: the Open/Shut lifecycle around one performer.

#[allow(clippy::module_inception)]
mod consumer;

pub use consumer::{Consumer, ConsumerState};
