//! Read-only snapshots of the dispatcher for operators and tests.

use std::fmt;

use crate::consumer::{Consumer, ConsumerState};
use crate::pump::{JobId, JobOutcome};
use crate::subscription::MessagePumpType;

/// Overall run state of a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatcherState {
    /// Constructed, never started.
    Awaiting,
    /// At least one consumer is open.
    Running,
    /// No consumer is live: every one was shut or has exited.
    Stopped,
}

impl fmt::Display for DispatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatcherState::Awaiting => write!(f, "awaiting"),
            DispatcherState::Running => write!(f, "running"),
            DispatcherState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Snapshot of one live consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerInfo {
    pub name: String,
    pub subscription: String,
    pub state: ConsumerState,
    pub job: Option<JobId>,
    /// The job has exited (quit, limit reached, or fault) and the supervisor
    /// has not removed it yet.
    pub finished: bool,
    pub pump_type: MessagePumpType,
}

impl From<&Consumer> for ConsumerInfo {
    fn from(consumer: &Consumer) -> Self {
        Self {
            name: consumer.name().to_string(),
            subscription: consumer.subscription().to_string(),
            state: consumer.state(),
            job: consumer.job_id(),
            finished: consumer.is_finished(),
            pump_type: consumer.performer().pump_type(),
        }
    }
}

/// Per-subscription view: configured performers against live consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionStatus {
    pub name: String,
    pub pump_type: MessagePumpType,
    pub configured_performers: usize,
    pub consumers: Vec<ConsumerInfo>,
}

impl SubscriptionStatus {
    /// Consumers that are open and still running.
    pub fn running(&self) -> usize {
        self.consumers
            .iter()
            .filter(|c| c.state == ConsumerState::Open && !c.finished)
            .count()
    }

    /// Whether the subscription has its full complement of running consumers.
    pub fn is_open(&self) -> bool {
        self.running() == self.configured_performers
    }
}

/// How a consumer's job ended, reported when the consumer is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub consumer: String,
    pub subscription: String,
    pub job: Option<JobId>,
    /// `None` if the consumer was never opened.
    pub outcome: Option<JobOutcome>,
}

impl JobReport {
    /// Whether the job ended with an error.
    pub fn is_faulted(&self) -> bool {
        matches!(self.outcome, Some(Err(_)))
    }
}
