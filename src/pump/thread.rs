//! Thread pump: one dedicated OS thread per performer, blocking dispatch.

use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info, info_span, warn};

use super::base::{route, Action, PumpSettings, PumpStats, Route, Step, StopToken};
use super::error::PumpError;
use super::job::{JobHandle, JobOutcome};
use super::MessagePump;
use crate::channel::{Channel, ChannelControl};
use crate::mapper::MessageMapper;
use crate::message::Message;
use crate::processor::RequestProcessor;
use crate::subscription::MessagePumpType;

/// Message pump that blocks its own thread on receive and dispatch.
///
/// ```text
/// receive ──▶ quit? ──▶ map ──▶ route ──▶ send/publish ──▶ acknowledge
///                        │        │             │
///                        ▼        ▼             ▼
///                 ack + count  reject +    requeue or drop
///                             fault job
/// ```
pub struct ThreadPump {
    settings: PumpSettings,
    channel: Arc<dyn Channel>,
    mapper: Arc<dyn MessageMapper>,
    processor: Arc<dyn RequestProcessor>,
    stop: StopToken,
}

impl ThreadPump {
    pub fn new(
        settings: PumpSettings,
        channel: Arc<dyn Channel>,
        mapper: Arc<dyn MessageMapper>,
        processor: Arc<dyn RequestProcessor>,
    ) -> Self {
        Self {
            settings,
            channel,
            mapper,
            processor,
            stop: StopToken::new(),
        }
    }

    /// Run the loop on the calling thread until quit, stop, or a fatal error.
    pub fn run(&self) -> JobOutcome {
        let mut stats = PumpStats::default();
        info!(
            subscription = %self.settings.subscription,
            channel = %self.settings.channel_name,
            "message pump started"
        );

        loop {
            if self.settings.should_stop(&stats) {
                self.channel.stop();
                break;
            }

            let received = self.channel.receive(self.settings.timeout);
            let message = match self.settings.on_receive(received, self.stop.is_stopped(), &mut stats) {
                Step::Dispatch(message) => message,
                Step::Discard(message) => {
                    self.acknowledge(&message);
                    continue;
                }
                Step::Idle => {
                    if self.idle() {
                        break;
                    }
                    continue;
                }
                Step::Retry => {
                    if self.stop.sleep(self.settings.channel_failure_delay) {
                        break;
                    }
                    continue;
                }
                Step::Quit => break,
                Step::Fault(err) => {
                    self.channel.dispose();
                    return Err(err);
                }
            };

            let request = match self.mapper.map_to_request(&message) {
                Ok(request) => request,
                Err(err) => {
                    self.settings.on_unreadable(&message, &err, &mut stats);
                    self.acknowledge(&message);
                    continue;
                }
            };

            let action = match route(&message, request.as_ref()) {
                Ok(Route::Send) => {
                    let sent = self.processor.send(request.as_ref());
                    self.settings.on_dispatch(&message, sent, &mut stats)
                }
                Ok(Route::Publish) => {
                    let published = self.processor.publish(request.as_ref());
                    self.settings.on_dispatch(&message, published, &mut stats)
                }
                Err(err) => Action::Fault(err),
            };

            match action {
                Action::Ack => self.acknowledge(&message),
                Action::Requeue(message) => {
                    match self.channel.requeue(&message, self.settings.requeue_delay) {
                        Ok(_) => stats.requeued += 1,
                        Err(err) => warn!(message_id = %message.id(), error = %err, "failed to requeue message"),
                    }
                }
                Action::Drop(message) => self.reject(&message),
                Action::Fault(err) => {
                    error!(
                        channel = %self.settings.channel_name,
                        message_id = %message.id(),
                        error = %err,
                        "configuration error, rejecting message and stopping pump"
                    );
                    self.reject(&message);
                    self.channel.dispose();
                    return Err(err);
                }
            }
        }

        self.channel.dispose();
        info!(
            subscription = %self.settings.subscription,
            channel = %self.settings.channel_name,
            dispatched = stats.dispatched,
            "message pump finished"
        );
        Ok(stats)
    }

    /// Pause after an empty receive. Returns whether the pump should exit.
    fn idle(&self) -> bool {
        if self.stop.is_stopped() {
            return true;
        }
        if self.settings.empty_channel_delay.is_zero() {
            return false;
        }
        self.stop.sleep(self.settings.empty_channel_delay)
    }

    fn acknowledge(&self, message: &Message) {
        match self.channel.acknowledge(message) {
            Ok(()) => debug!(channel = %self.settings.channel_name, message_id = %message.id(), "acknowledged"),
            Err(err) => warn!(message_id = %message.id(), error = %err, "failed to acknowledge message"),
        }
    }

    fn reject(&self, message: &Message) {
        if let Err(err) = self.channel.reject(message) {
            warn!(message_id = %message.id(), error = %err, "failed to reject message");
        }
    }
}

impl MessagePump for ThreadPump {
    fn pump_type(&self) -> MessagePumpType {
        MessagePumpType::Thread
    }

    fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    fn launch(self: Arc<Self>, job: &JobHandle) -> Result<(), PumpError> {
        let completion = job.completion();
        let span = info_span!(
            "message_pump",
            subscription = %self.settings.subscription,
            channel = %self.settings.channel_name,
            job = %job.id()
        );
        let name = format!("pump-{}", self.settings.channel_name);

        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                let _entered = span.enter();
                let outcome = self.run();
                completion.complete(outcome);
            })
            .map_err(|e| PumpError::Spawn(e.to_string()))?;

        job.attach_thread(handle);
        Ok(())
    }
}
