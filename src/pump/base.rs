//! Rules shared by the thread and reactor pumps.
//!
//! Both loops ask the same questions of every receive and every dispatch;
//! the answers live here as [`Step`] and [`Action`] values, so a pump variant
//! only performs the blocking or awaiting I/O they call for.

use std::fmt::Display;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use super::error::PumpError;
use crate::channel::ChannelError;
use crate::message::{Message, MessageType};
use crate::processor::HandlerError;
use crate::request::{request_type_name, Request, RequestKind};
use crate::subscription::Subscription;

/// Per-pump policy, copied from the subscription when the pump is built.
#[derive(Debug, Clone)]
pub struct PumpSettings {
    pub subscription: String,
    pub channel_name: String,
    pub routing_key: String,
    pub timeout: Duration,
    /// Maximum delivery attempts including the first; -1 is unlimited.
    pub requeue_count: i32,
    pub requeue_delay: Duration,
    /// Unacceptable messages tolerated before the pump stops; 0 is unlimited.
    pub unacceptable_message_limit: u32,
    pub channel_failure_delay: Duration,
    pub empty_channel_delay: Duration,
}

impl PumpSettings {
    pub fn from_subscription(subscription: &Subscription) -> Self {
        Self {
            subscription: subscription.name().to_string(),
            channel_name: subscription.channel_name().to_string(),
            routing_key: subscription.routing_key().to_string(),
            timeout: subscription.timeout(),
            requeue_count: subscription.requeue_count(),
            requeue_delay: subscription.requeue_delay(),
            unacceptable_message_limit: subscription.unacceptable_message_limit(),
            channel_failure_delay: subscription.channel_failure_delay(),
            empty_channel_delay: subscription.empty_channel_delay(),
        }
    }

    /// Whether the pump has seen as many unacceptable messages as it tolerates.
    pub(crate) fn unacceptable_limit_reached(&self, stats: &PumpStats) -> bool {
        self.unacceptable_message_limit > 0
            && stats.unacceptable >= u64::from(self.unacceptable_message_limit)
    }

    /// Checked before each receive; when true the pump stops its channel and
    /// leaves the loop cleanly.
    pub(crate) fn should_stop(&self, stats: &PumpStats) -> bool {
        let reached = self.unacceptable_limit_reached(stats);
        if reached {
            error!(
                channel = %self.channel_name,
                unacceptable = stats.unacceptable,
                limit = self.unacceptable_message_limit,
                "unacceptable message limit reached, stopping channel"
            );
        }
        reached
    }

    /// Classify one receive result.
    ///
    /// `stopped` is whether the performer asked the pump to stop; a disposed
    /// channel is then the expected way out rather than a fault.
    pub(crate) fn on_receive(
        &self,
        received: Result<Option<Message>, ChannelError>,
        stopped: bool,
        stats: &mut PumpStats,
    ) -> Step {
        let message = match received {
            Ok(Some(message)) => message,
            Ok(None) => return Step::Idle,
            Err(ChannelError::Disposed(name)) if stopped => {
                debug!(channel = %name, "channel disposed after stop");
                return Step::Quit;
            }
            Err(err) if err.is_transient() => {
                stats.channel_failures += 1;
                warn!(
                    channel = %self.channel_name,
                    error = %err,
                    delay_ms = self.channel_failure_delay.as_millis() as u64,
                    "channel failure on receive, retrying"
                );
                return Step::Retry;
            }
            Err(err) => {
                error!(channel = %self.channel_name, error = %err, "channel unusable, stopping pump");
                return Step::Fault(PumpError::Channel(err));
            }
        };

        stats.receives += 1;
        match message.message_type() {
            MessageType::Quit => {
                info!(channel = %self.channel_name, "quit message received, stopping pump");
                Step::Quit
            }
            MessageType::None => Step::Idle,
            MessageType::Unacceptable => {
                warn!(
                    channel = %self.channel_name,
                    message_id = %message.id(),
                    "unacceptable message received, acknowledging"
                );
                stats.unacceptable += 1;
                Step::Discard(message)
            }
            MessageType::Command | MessageType::Event | MessageType::Document => {
                debug!(
                    channel = %self.channel_name,
                    message_id = %message.id(),
                    message_type = ?message.message_type(),
                    "translating message"
                );
                Step::Dispatch(message)
            }
        }
    }

    /// Count a message the mapper could not read. The pump acknowledges it.
    pub(crate) fn on_unreadable(&self, message: &Message, err: &impl Display, stats: &mut PumpStats) {
        warn!(
            channel = %self.channel_name,
            message_id = %message.id(),
            error = %err,
            "failed to map message, acknowledging as unacceptable"
        );
        stats.unacceptable += 1;
    }

    /// Decide what happens to a message after its dispatch returned.
    pub(crate) fn on_dispatch(
        &self,
        message: &Message,
        dispatched: Result<(), HandlerError>,
        stats: &mut PumpStats,
    ) -> Action {
        let err = match dispatched {
            Ok(()) => {
                stats.dispatched += 1;
                return Action::Ack;
            }
            Err(err) if err.is_configuration() => {
                return Action::Fault(PumpError::Configuration(err.to_string()));
            }
            Err(err) => err,
        };

        stats.failed += 1;
        error!(
            channel = %self.channel_name,
            message_id = %message.id(),
            error = %err,
            deferred = err.is_defer(),
            "dispatch failed"
        );
        match retry(message, self.requeue_count) {
            Retry::Requeue(message) => {
                debug!(
                    channel = %self.channel_name,
                    message_id = %message.id(),
                    handled_count = message.header.handled_count,
                    "requeueing message"
                );
                Action::Requeue(message)
            }
            Retry::Drop(message) => {
                error!(
                    channel = %self.channel_name,
                    message_id = %message.id(),
                    handled_count = message.header.handled_count,
                    requeue_count = self.requeue_count,
                    "requeue limit reached, dropping message"
                );
                stats.dropped += 1;
                Action::Drop(message)
            }
        }
    }
}

/// What a pump does after one receive.
#[derive(Debug)]
pub(crate) enum Step {
    /// Map and dispatch the message.
    Dispatch(Message),
    /// Acknowledge without dispatch; already counted as unacceptable.
    Discard(Message),
    /// Nothing arrived; pause for the empty-channel delay.
    Idle,
    /// Transient failure; pause for the channel-failure delay.
    Retry,
    /// Leave the loop cleanly.
    Quit,
    /// Dispose the channel and fault the job.
    Fault(PumpError),
}

/// What a pump does with a message once dispatch has returned.
#[derive(Debug)]
pub(crate) enum Action {
    Ack,
    /// Return this copy, with its handled count bumped, to the channel.
    Requeue(Message),
    /// Reject this copy; its attempts ran out.
    Drop(Message),
    /// Reject the message, dispose the channel and fault the job.
    Fault(PumpError),
}

/// Statistics from one pump run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PumpStats {
    /// Envelopes taken off the channel (quit and empty markers included).
    pub receives: u64,
    /// Requests dispatched and acknowledged.
    pub dispatched: u64,
    /// Dispatch attempts that failed.
    pub failed: u64,
    /// Messages returned to the channel for another attempt.
    pub requeued: u64,
    /// Messages dropped after their attempts ran out.
    pub dropped: u64,
    /// Messages acknowledged without dispatch because they could not be read.
    pub unacceptable: u64,
    /// Receives that failed with a transport error.
    pub channel_failures: u64,
}

/// How a mapped request is handed to the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    /// Exactly one handler.
    Send,
    /// Zero or more handlers.
    Publish,
}

/// Check the envelope type against the request kind and pick the route.
///
/// A command envelope carrying an event, or an event/document carrying a
/// command, is a configuration defect.
pub(crate) fn route(message: &Message, request: &dyn Request) -> Result<Route, PumpError> {
    match (message.message_type(), request.kind()) {
        (MessageType::Command, RequestKind::Command) => Ok(Route::Send),
        (MessageType::Event | MessageType::Document, RequestKind::Event) => Ok(Route::Publish),
        (MessageType::Command, RequestKind::Event) => Err(PumpError::Configuration(format!(
            "message {} is a command but {} is an event; use publish",
            message.id(),
            request_type_name(request)
        ))),
        (message_type, RequestKind::Command) => Err(PumpError::Configuration(format!(
            "message {} is {:?} but {} is a command; use send",
            message.id(),
            message_type,
            request_type_name(request)
        ))),
        (message_type, RequestKind::Event) => Err(PumpError::Configuration(format!(
            "message {} of type {:?} cannot be dispatched",
            message.id(),
            message_type
        ))),
    }
}

/// What to do with a message whose dispatch failed.
#[derive(Debug)]
pub(crate) enum Retry {
    /// Return it to the channel.
    Requeue(Message),
    /// Attempts exhausted; reject it.
    Drop(Message),
}

/// Count the failed attempt and decide between requeue and drop.
pub(crate) fn retry(message: &Message, requeue_count: i32) -> Retry {
    let mut message = message.clone();
    message.update_handled_count();
    if message.handled_count_reached(requeue_count) {
        Retry::Drop(message)
    } else {
        Retry::Requeue(message)
    }
}

/// Cooperative stop signal shared by a performer and its pump.
///
/// The channel's own `stop()` ends a healthy pump through the quit pill; the
/// token covers the pump's idle and failure delays, and a channel that keeps
/// timing out or failing once stop was requested.
#[derive(Clone, Default)]
pub struct StopToken {
    inner: Arc<StopInner>,
}

#[derive(Default)]
struct StopInner {
    stopped: Mutex<bool>,
    changed: Condvar,
    notify: Notify,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Idempotent.
    pub fn stop(&self) {
        *self.inner.stopped.lock().unwrap_or_else(|e| e.into_inner()) = true;
        self.inner.changed.notify_all();
        self.inner.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.stopped.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block for `duration` or until stopped. Returns whether stop was requested.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut stopped = self.inner.stopped.lock().unwrap_or_else(|e| e.into_inner());
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            stopped = self
                .inner
                .changed
                .wait_timeout(stopped, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        *stopped
    }

    /// Suspend for `duration` or until stopped. Returns whether stop was requested.
    pub async fn sleep_async(&self, duration: Duration) -> bool {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_stopped() {
            return true;
        }
        let _ = tokio::time::timeout(duration, notified).await;
        self.is_stopped()
    }
}
