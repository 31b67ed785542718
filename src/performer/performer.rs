use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::error::PerformerError;
use crate::channel::{AsyncChannel, Channel, ChannelControl};
use crate::pump::{JobHandle, MessagePump, StopToken};
use crate::subscription::MessagePumpType;

/// The channel a performer owns, in whichever flavour its pump reads.
#[derive(Clone)]
pub enum PerformerChannel {
    Blocking(Arc<dyn Channel>),
    Async(Arc<dyn AsyncChannel>),
}

impl PerformerChannel {
    pub fn name(&self) -> &str {
        match self {
            PerformerChannel::Blocking(channel) => channel.name(),
            PerformerChannel::Async(channel) => channel.name(),
        }
    }

    pub fn stop(&self) {
        match self {
            PerformerChannel::Blocking(channel) => channel.stop(),
            PerformerChannel::Async(channel) => channel.stop(),
        }
    }

    pub fn dispose(&self) {
        match self {
            PerformerChannel::Blocking(channel) => channel.dispose(),
            PerformerChannel::Async(channel) => channel.dispose(),
        }
    }
}

/// Hosts exactly one message pump as a stoppable unit of work.
///
/// ## Example
///
/// ```ignore
/// let performer = Performer::new(channel, Box::new(pump));
/// let job = performer.run()?;
///
/// // ... later ...
/// performer.stop();
/// let stats = job.wait()?;
/// performer.dispose();
/// ```
pub struct Performer {
    channel: PerformerChannel,
    pump: Arc<dyn MessagePump>,
    launched: bool,
    stop: StopToken,
    pump_type: MessagePumpType,
}

impl Performer {
    /// Create a performer owning `channel` and the pump that reads it.
    pub fn new(channel: PerformerChannel, pump: Box<dyn MessagePump>) -> Self {
        Self {
            stop: pump.stop_token(),
            pump_type: pump.pump_type(),
            channel,
            pump: Arc::from(pump),
            launched: false,
        }
    }

    pub fn channel_name(&self) -> &str {
        self.channel.name()
    }

    pub fn pump_type(&self) -> MessagePumpType {
        self.pump_type
    }

    /// Launch the pump on its own worker.
    ///
    /// The returned handle completes when the loop exits: quit seen, channel
    /// stopped, or a fatal error (reported as a faulted outcome). A pump runs
    /// at most once; if its worker could not be started, `run` may be called
    /// again.
    pub fn run(&mut self) -> Result<JobHandle, PerformerError> {
        if self.launched {
            return Err(PerformerError::AlreadyRunning(self.channel.name().to_string()));
        }

        let job = JobHandle::new(self.channel.name());
        Arc::clone(&self.pump).launch(&job)?;
        self.launched = true;
        info!(channel = %self.channel.name(), job = %job.id(), pump = ?self.pump_type, "performer running");
        Ok(job)
    }

    /// Ask the pump to finish. The in-flight message completes first.
    /// Idempotent.
    pub fn stop(&self) {
        debug!(channel = %self.channel.name(), "stopping performer");
        self.stop.stop();
        self.channel.stop();
    }

    /// Release the channel. Safe after `stop()`.
    pub fn dispose(&self) {
        self.channel.dispose();
    }
}

impl fmt::Debug for Performer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Performer")
            .field("channel", &self.channel.name())
            .field("pump_type", &self.pump_type)
            .field("launched", &self.launched)
            .finish()
    }
}
