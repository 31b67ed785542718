use std::fmt;

use tracing::{debug, info};

use crate::performer::{Performer, PerformerError};
use crate::pump::{JobHandle, JobId, JobOutcome};

/// Whether a consumer's performer is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumerState {
    Shut,
    Open,
}

/// Lifecycle wrapper binding a subscription to one performer.
///
/// Two consumers are equal when they belong to the same subscription and
/// track the same job.
pub struct Consumer {
    name: String,
    subscription: String,
    performer: Performer,
    state: ConsumerState,
    job: Option<JobHandle>,
}

impl Consumer {
    pub fn new(name: impl Into<String>, subscription: impl Into<String>, performer: Performer) -> Self {
        Self {
            name: name.into(),
            subscription: subscription.into(),
            performer,
            state: ConsumerState::Shut,
            job: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConsumerState::Open
    }

    pub fn performer(&self) -> &Performer {
        &self.performer
    }

    pub fn job(&self) -> Option<&JobHandle> {
        self.job.as_ref()
    }

    pub fn job_id(&self) -> Option<JobId> {
        self.job.as_ref().map(JobHandle::id)
    }

    /// Start the performer and record its job. Shut → Open.
    ///
    /// A performer runs once, so reopening a shut consumer fails with
    /// `AlreadyRunning`; the dispatcher creates fresh consumers instead.
    pub fn open(&mut self) -> Result<&JobHandle, PerformerError> {
        if self.state == ConsumerState::Open {
            return Err(PerformerError::AlreadyRunning(self.name.clone()));
        }
        let job = self.performer.run()?;
        self.state = ConsumerState::Open;
        info!(consumer = %self.name, subscription = %self.subscription, job = %job.id(), "consumer opened");
        Ok(self.job.insert(job))
    }

    /// Stop the performer. Open → Shut; no-op when already shut.
    pub fn shut(&mut self) {
        if self.state == ConsumerState::Open {
            self.performer.stop();
            self.state = ConsumerState::Shut;
            info!(consumer = %self.name, subscription = %self.subscription, "consumer shut");
        }
    }

    /// Block until the performer's job has exited. `None` if never opened.
    pub fn wait(&self) -> Option<JobOutcome> {
        self.job.as_ref().map(JobHandle::wait)
    }

    /// Whether the job has exited on its own or after a shut.
    pub fn is_finished(&self) -> bool {
        self.job.as_ref().is_some_and(JobHandle::is_finished)
    }

    /// Release the performer's channel.
    pub fn dispose(&mut self) {
        debug!(consumer = %self.name, "disposing consumer");
        self.performer.dispose();
    }
}

impl PartialEq for Consumer {
    fn eq(&self, other: &Self) -> bool {
        self.subscription == other.subscription && self.job_id() == other.job_id()
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("name", &self.name)
            .field("subscription", &self.subscription)
            .field("state", &self.state)
            .field("job", &self.job_id())
            .finish()
    }
}
