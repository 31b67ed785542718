//! Reactor pump: one task per performer on a tokio runtime, suspending
//! dispatch.
//!
//! Receive and dispatch suspend the task rather than block a thread, but one
//! pump still handles its messages strictly in order: the next receive starts
//! only after the previous dispatch has completed or failed.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::base::{route, Action, PumpSettings, PumpStats, Route, Step, StopToken};
use super::error::PumpError;
use super::job::{JobHandle, JobOutcome};
use super::MessagePump;
use crate::channel::{AsyncChannel, ChannelControl};
use crate::mapper::MessageMapper;
use crate::message::Message;
use crate::processor::AsyncRequestProcessor;
use crate::request::Request;
use crate::subscription::MessagePumpType;

/// Message pump that runs as a task and awaits receive and dispatch.
pub struct ReactorPump {
    settings: PumpSettings,
    channel: Arc<dyn AsyncChannel>,
    mapper: Arc<dyn MessageMapper>,
    processor: Arc<dyn AsyncRequestProcessor>,
    runtime: Handle,
    stop: StopToken,
}

impl ReactorPump {
    pub fn new(
        settings: PumpSettings,
        channel: Arc<dyn AsyncChannel>,
        mapper: Arc<dyn MessageMapper>,
        processor: Arc<dyn AsyncRequestProcessor>,
        runtime: Handle,
    ) -> Self {
        Self {
            settings,
            channel,
            mapper,
            processor,
            runtime,
            stop: StopToken::new(),
        }
    }

    /// Run the loop until quit, stop, or a fatal error.
    pub async fn run(&self) -> JobOutcome {
        let mut stats = PumpStats::default();
        info!(
            subscription = %self.settings.subscription,
            channel = %self.settings.channel_name,
            "reactor pump started"
        );

        loop {
            if self.settings.should_stop(&stats) {
                self.channel.stop();
                break;
            }

            let received = self.channel.receive_async(self.settings.timeout).await;
            let message = match self.settings.on_receive(received, self.stop.is_stopped(), &mut stats) {
                Step::Dispatch(message) => message,
                Step::Discard(message) => {
                    self.acknowledge(&message).await;
                    continue;
                }
                Step::Idle => {
                    if self.idle().await {
                        break;
                    }
                    continue;
                }
                Step::Retry => {
                    if self.stop.sleep_async(self.settings.channel_failure_delay).await {
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

            let request: Arc<dyn Request> = match self.mapper.map_to_request(&message) {
                Ok(request) => Arc::from(request),
                Err(err) => {
                    self.settings.on_unreadable(&message, &err, &mut stats);
                    self.acknowledge(&message).await;
                    continue;
                }
            };

            let action = match route(&message, request.as_ref()) {
                Ok(Route::Send) => {
                    let sent = self.processor.send_async(request).await;
                    self.settings.on_dispatch(&message, sent, &mut stats)
                }
                Ok(Route::Publish) => {
                    let published = self.processor.publish_async(request).await;
                    self.settings.on_dispatch(&message, published, &mut stats)
                }
                Err(err) => Action::Fault(err),
            };

            match action {
                Action::Ack => self.acknowledge(&message).await,
                Action::Requeue(message) => {
                    match self
                        .channel
                        .requeue_async(&message, self.settings.requeue_delay)
                        .await
                    {
                        Ok(_) => stats.requeued += 1,
                        Err(err) => warn!(message_id = %message.id(), error = %err, "failed to requeue message"),
                    }
                }
                Action::Drop(message) => self.reject(&message).await,
                Action::Fault(err) => {
                    error!(
                        channel = %self.settings.channel_name,
                        message_id = %message.id(),
                        error = %err,
                        "configuration error, rejecting message and stopping pump"
                    );
                    self.reject(&message).await;
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
            "reactor pump finished"
        );
        Ok(stats)
    }

    async fn idle(&self) -> bool {
        if self.stop.is_stopped() {
            return true;
        }
        if self.settings.empty_channel_delay.is_zero() {
            // Let other tasks on this worker run between empty polls
            tokio::task::yield_now().await;
            return false;
        }
        self.stop.sleep_async(self.settings.empty_channel_delay).await
    }

    async fn acknowledge(&self, message: &Message) {
        match self.channel.acknowledge_async(message).await {
            Ok(()) => debug!(channel = %self.settings.channel_name, message_id = %message.id(), "acknowledged"),
            Err(err) => warn!(message_id = %message.id(), error = %err, "failed to acknowledge message"),
        }
    }

    async fn reject(&self, message: &Message) {
        if let Err(err) = self.channel.reject_async(message).await {
            warn!(message_id = %message.id(), error = %err, "failed to reject message");
        }
    }
}

impl MessagePump for ReactorPump {
    fn pump_type(&self) -> MessagePumpType {
        MessagePumpType::Reactor
    }

    fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    fn launch(self: Arc<Self>, job: &JobHandle) -> Result<(), PumpError> {
        let completion = job.completion();
        let span = info_span!(
            "reactor_pump",
            subscription = %self.settings.subscription,
            channel = %self.settings.channel_name,
            job = %job.id()
        );
        let runtime = self.runtime.clone();

        runtime.spawn(
            async move {
                let outcome = self.run().await;
                completion.complete(outcome);
            }
            .instrument(span),
        );
        Ok(())
    }
}
