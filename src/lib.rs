//! sourced_dispatch: a broker-agnostic message dispatch engine.
//!
//! Envelopes are pulled from a [`Channel`](channel::Channel), mapped to typed
//! [`Request`](request::Request)s, routed through a
//! [`RequestProcessor`](processor::RequestProcessor), and acknowledged or
//! requeued. A [`Dispatcher`] supervises one or more workers per
//! [`Subscription`]:
//!
//! ```text
//! Dispatcher ─▶ Consumer ─▶ Performer ─▶ MessagePump ─▶ Channel
//!                                             │
//!                                             ├─▶ MessageMapper
//!                                             └─▶ RequestProcessor
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use sourced_dispatch::channel::{InMemoryBus, InMemoryChannelFactory};
//! use sourced_dispatch::mapper::MessageMapperRegistry;
//! use sourced_dispatch::processor::CommandProcessor;
//! use sourced_dispatch::{Dispatcher, Subscription};
//!
//! let bus = InMemoryBus::new();
//! let factory = Arc::new(InMemoryChannelFactory::new(bus.clone()));
//!
//! let dispatcher = Dispatcher::builder()
//!     .processor(CommandProcessor::new().handle::<OrderPlaced, _>(|event| {
//!         println!("order {} placed", event.id);
//!         Ok(())
//!     }))
//!     .mappers(MessageMapperRegistry::new().json::<OrderPlaced>("OrderPlaced"))
//!     .subscription(
//!         Subscription::new("orders", "orders.placed", "OrderPlaced", factory)
//!             .with_performers(2),
//!     )
//!     .build()?;
//!
//! dispatcher.start()?;
//! // ...
//! dispatcher.stop();
//! ```

pub mod channel;
pub mod consumer;
pub mod dispatcher;
pub mod mapper;
pub mod message;
pub mod performer;
pub mod processor;
pub mod pump;
pub mod request;
pub mod subscription;

pub use channel::{Channel, ChannelError, ChannelFactory};
pub use consumer::{Consumer, ConsumerState};
pub use dispatcher::{Dispatcher, DispatcherBuilder, DispatcherError, DispatcherState};
pub use mapper::{MappingError, MessageMapper, MessageMapperRegistry};
pub use message::{Message, MessageHeader, MessageType};
pub use performer::{Performer, PerformerError};
pub use processor::{AsyncRequestProcessor, CommandProcessor, HandlerError, RequestProcessor};
pub use pump::{JobHandle, JobOutcome, MessagePump, PumpError, PumpStats};
pub use request::{Request, RequestKind};
pub use subscription::{DispatcherConfig, MessagePumpType, Subscription, SubscriptionSettings};
