//! Dispatcher: the supervisory control surface over subscriptions and their
//! consumers.
//!
//! ```text
//!                      ┌──────────── Dispatcher ────────────┐
//!                      │ subscriptions (fixed)              │
//!   start / stop  ───▶ │ consumers (live)                   │
//!   open / shut name   └──┬──────────────┬──────────────────┘
//!                         ▼              ▼
//!                     Consumer       Consumer      (one per performer slot)
//!                         │              │
//!                     Performer      Performer
//!                         │              │
//!                    MessagePump    MessagePump ──▶ Channel / Processor
//! ```
//!
//! State machine: `Awaiting` until the first start, `Running` while any
//! consumer is live, `Stopped` after a full stop, once every subscription
//! has been shut, or once the supervisor has removed the last consumer whose
//! job exited on its own. Reopening any subscription returns it to `Running`.

mod builder;
#[allow(clippy::module_inception)]
mod dispatcher;
mod error;
mod status;

pub use builder::DispatcherBuilder;
pub use dispatcher::Dispatcher;
pub use error::DispatcherError;
pub use status::{ConsumerInfo, DispatcherState, JobReport, SubscriptionStatus};
