//! Message pumps: the per-worker receive → map → dispatch → ack/requeue loop.
//!
//! Two interchangeable strategies sit behind [`MessagePump`]:
//!
//! | Pump            | Worker               | Channel          | Processor               |
//! |-----------------|----------------------|------------------|-------------------------|
//! | [`ThreadPump`]  | dedicated OS thread  | `Channel`        | `RequestProcessor`      |
//! | [`ReactorPump`] | task on a runtime    | `AsyncChannel`   | `AsyncRequestProcessor` |
//!
//! Both follow the same rules:
//! - A quit envelope ends the loop; the channel is disposed on exit.
//! - Unreadable messages are acknowledged and counted. A positive
//!   unacceptable-message limit stops the pump once reached.
//! - A command envelope is sent to exactly one handler; events and documents
//!   are published. A mismatch between envelope and request kind, or a
//!   configuration-class handler error, rejects the message and faults the job.
//! - Other dispatch failures requeue the message until its delivery attempts
//!   reach the requeue limit, then reject it.
//! - Transient receive failures are retried after a delay and never fault
//!   the job. Any other receive error disposes the channel and faults it.
//!
//! The per-message decisions live in `base`; the variants only do the I/O.

mod base;
mod error;
mod job;
mod reactor;
mod thread;

pub use base::{PumpSettings, PumpStats, StopToken};
pub use error::PumpError;
pub use job::{JobHandle, JobId, JobOutcome};
pub use reactor::ReactorPump;
pub use thread::ThreadPump;

use std::sync::Arc;

use crate::subscription::MessagePumpType;

/// A message loop that can be launched onto its own worker.
pub trait MessagePump: Send + Sync {
    fn pump_type(&self) -> MessagePumpType;

    /// The stop signal the pump observes during delays and empty receives.
    fn stop_token(&self) -> StopToken;

    /// Start the loop on the pump's worker. The outcome is recorded on `job`
    /// when the loop exits.
    ///
    /// The worker holds its own reference; on `Err` the caller's pump is
    /// untouched and may be launched again.
    fn launch(self: Arc<Self>, job: &JobHandle) -> Result<(), PumpError>;
}
