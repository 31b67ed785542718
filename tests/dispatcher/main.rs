//! Dispatcher integration tests.
//!
//! Drives full dispatchers over an in-memory bus:
//! - Start / stop lifecycle and state transitions
//! - Opening and shutting subscriptions independently
//! - Consumers whose jobs end on their own are removed automatically
//! - Reactor subscriptions on the dispatcher's runtime
//! - Building from JSON configuration

#[path = "../support/mod.rs"]
mod support;

mod lifecycle;
mod subscriptions;

use std::sync::Arc;

use sourced_dispatch::channel::{ChannelFactory, InMemoryBus, InMemoryChannelFactory};
use sourced_dispatch::mapper::MessageMapperRegistry;
use sourced_dispatch::processor::CommandProcessor;

use support::{OrderPlaced, PlaceOrder, Recorder};

/// A bus and a factory creating channels on it.
fn in_memory() -> (InMemoryBus, Arc<dyn ChannelFactory>) {
    let bus = InMemoryBus::new();
    let factory: Arc<dyn ChannelFactory> = Arc::new(InMemoryChannelFactory::new(bus.clone()));
    (bus, factory)
}

/// Mappers for both test request types.
fn mappers() -> MessageMapperRegistry {
    MessageMapperRegistry::new()
        .json::<OrderPlaced>("OrderPlaced")
        .json::<PlaceOrder>("PlaceOrder")
}

/// Blocking handlers for both request types that record what they saw.
fn recording(recorder: &Recorder) -> CommandProcessor {
    let events = recorder.clone();
    let commands = recorder.clone();
    CommandProcessor::new()
        .handle::<OrderPlaced, _>(move |event| {
            events.record(&event.id);
            Ok(())
        })
        .handle::<PlaceOrder, _>(move |command| {
            commands.record(&command.id);
            Ok(())
        })
}
