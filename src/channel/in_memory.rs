//! In-memory transport for testing and single-process scenarios.
//!
//! This module provides a thread-safe in-memory bus of named queues and a
//! channel over one queue that implements both `Channel` and `AsyncChannel`,
//! useful for:
//! - Unit and integration testing without a broker
//! - Single-process applications
//! - Development and prototyping

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::channel::{AsyncChannel, Channel, ChannelControl, ChannelFactory};
use super::error::ChannelError;
use crate::message::Message;
use crate::subscription::Subscription;

struct Entry {
    seq: u64,
    visible_at: Instant,
    message: Message,
}

#[derive(Default)]
struct QueueState {
    entries: VecDeque<Entry>,
    next_seq: u64,
    acknowledged: Vec<String>,
    rejected: Vec<Message>,
}

enum Take {
    Message(Message),
    Stopped,
    Empty { next_visible: Option<Instant> },
}

enum Poll {
    Ready(Option<Message>),
    Wait(Duration),
}

impl QueueState {
    fn push(&mut self, message: Message, visible_at: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(Entry {
            seq,
            visible_at,
            message,
        });
    }

    /// Take the first visible entry enqueued before `stop_at`.
    fn take(&mut self, now: Instant, stop_at: Option<u64>) -> Take {
        let visible = self.entries.iter().position(|e| e.visible_at <= now);
        match (visible, stop_at) {
            (Some(index), Some(stop_at)) if self.entries[index].seq >= stop_at => Take::Stopped,
            (Some(index), _) => match self.entries.remove(index) {
                Some(entry) => Take::Message(entry.message),
                None => Take::Empty { next_visible: None },
            },
            (None, Some(_)) => Take::Stopped,
            (None, None) => Take::Empty {
                next_visible: self.entries.iter().map(|e| e.visible_at).min(),
            },
        }
    }
}

/// One named queue shared by every channel bound to its routing key.
struct Queue {
    state: Mutex<QueueState>,
    available: Condvar,
    notify: Notify,
}

impl Queue {
    fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wake(&self) {
        self.available.notify_all();
        self.notify.notify_waiters();
    }
}

/// In-memory bus of named queues, keyed by routing key.
///
/// Features:
/// - Thread-safe (can be shared across threads via `Clone`)
/// - Competing consumers: every channel on a routing key drains the same queue
/// - Delayed requeue, acknowledgement and rejection tracking
///
/// ## Example
///
/// ```
/// use std::time::Duration;
/// use sourced_dispatch::channel::{Channel, InMemoryBus};
/// use sourced_dispatch::message::{Message, MessageType};
///
/// let bus = InMemoryBus::new();
/// bus.send("orders", Message::with_string_body("m-1", "orders", MessageType::Event, "{}"));
///
/// let channel = bus.channel("orders-channel", "orders");
/// let message = channel.receive(Duration::from_millis(10)).unwrap().unwrap();
/// assert_eq!(message.id(), "m-1");
/// channel.acknowledge(&message).unwrap();
///
/// assert!(bus.is_empty("orders"));
/// assert_eq!(bus.acknowledged("orders"), vec!["m-1".to_string()]);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBus {
    queues: Arc<RwLock<HashMap<String, Arc<Queue>>>>,
}

impl InMemoryBus {
    /// Create a new in-memory bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self, routing_key: &str) -> Arc<Queue> {
        if let Some(queue) = self
            .queues
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(routing_key)
        {
            return Arc::clone(queue);
        }
        let mut queues = self.queues.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            queues
                .entry(routing_key.to_string())
                .or_insert_with(|| Arc::new(Queue::new())),
        )
    }

    /// Send a message to the queue for a routing key.
    pub fn send(&self, routing_key: &str, message: Message) {
        let queue = self.queue(routing_key);
        queue.lock().push(message, Instant::now());
        queue.wake();
    }

    /// Send several messages in order.
    pub fn send_batch(&self, routing_key: &str, messages: Vec<Message>) {
        let queue = self.queue(routing_key);
        {
            let mut state = queue.lock();
            let now = Instant::now();
            for message in messages {
                state.push(message, now);
            }
        }
        queue.wake();
    }

    /// Create a channel consuming from the queue for a routing key.
    pub fn channel(&self, name: impl Into<String>, routing_key: impl Into<String>) -> InMemoryChannel {
        let routing_key = routing_key.into();
        InMemoryChannel {
            name: name.into(),
            queue: self.queue(&routing_key),
            routing_key,
            stop_at: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    /// Number of messages waiting on a routing key (including delayed ones).
    pub fn len(&self, routing_key: &str) -> usize {
        self.queue(routing_key).lock().entries.len()
    }

    /// Whether no messages are waiting on a routing key.
    pub fn is_empty(&self, routing_key: &str) -> bool {
        self.len(routing_key) == 0
    }

    /// Snapshot of the waiting messages, in delivery order.
    pub fn messages(&self, routing_key: &str) -> Vec<Message> {
        self.queue(routing_key)
            .lock()
            .entries
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    /// Ids of acknowledged messages.
    pub fn acknowledged(&self, routing_key: &str) -> Vec<String> {
        self.queue(routing_key).lock().acknowledged.clone()
    }

    /// Rejected messages.
    pub fn rejected(&self, routing_key: &str) -> Vec<Message> {
        self.queue(routing_key).lock().rejected.clone()
    }

    /// Remove all waiting messages from a routing key.
    pub fn purge(&self, routing_key: &str) {
        self.queue(routing_key).lock().entries.clear();
    }
}

/// A channel over one in-memory queue.
///
/// Several channels may share a routing key; they compete for its messages.
/// `stop()` is ordered: messages already waiting when it is called are still
/// delivered, after which every receive returns the quit pill.
pub struct InMemoryChannel {
    name: String,
    routing_key: String,
    queue: Arc<Queue>,
    stop_at: Mutex<Option<u64>>,
    disposed: AtomicBool,
}

impl InMemoryChannel {
    /// Append messages to the channel's queue (like sending on the bus).
    pub fn enqueue(&self, messages: impl IntoIterator<Item = Message>) {
        {
            let mut state = self.queue.lock();
            let now = Instant::now();
            for message in messages {
                state.push(message, now);
            }
        }
        self.queue.wake();
    }

    /// Number of messages waiting on the channel's queue.
    pub fn len(&self) -> usize {
        self.queue.lock().entries.len()
    }

    /// Whether the channel's queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `dispose()` has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Whether `stop()` has been called.
    pub fn is_stopped(&self) -> bool {
        self.stop_at().is_some()
    }

    fn stop_at(&self) -> Option<u64> {
        *self.stop_at.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_disposed(&self) -> Result<(), ChannelError> {
        if self.is_disposed() {
            Err(ChannelError::Disposed(self.name.clone()))
        } else {
            Ok(())
        }
    }

    /// One attempt under the queue lock; returns the message or how long to wait.
    fn poll(&self, state: &mut QueueState, deadline: Instant) -> Result<Poll, ChannelError> {
        self.check_disposed()?;
        let now = Instant::now();
        let next_visible = match state.take(now, self.stop_at()) {
            Take::Message(message) => return Ok(Poll::Ready(Some(message))),
            Take::Stopped => return Ok(Poll::Ready(Some(Message::quit(self.routing_key.clone())))),
            Take::Empty { next_visible } => next_visible,
        };
        if now >= deadline {
            return Ok(Poll::Ready(None));
        }
        let until = next_visible.map_or(deadline, |at| at.min(deadline));
        Ok(Poll::Wait(until.saturating_duration_since(now)))
    }

    fn requeue_message(&self, message: &Message, delay: Duration) -> Result<bool, ChannelError> {
        self.check_disposed()?;
        let mut requeued = message.clone();
        requeued.header.delayed_ms = delay.as_millis() as u64;
        self.queue.lock().push(requeued, Instant::now() + delay);
        self.queue.wake();
        Ok(true)
    }

    fn acknowledge_message(&self, message: &Message) -> Result<(), ChannelError> {
        self.queue.lock().acknowledged.push(message.id().to_string());
        Ok(())
    }

    fn reject_message(&self, message: &Message) -> Result<bool, ChannelError> {
        self.queue.lock().rejected.push(message.clone());
        Ok(true)
    }
}

impl ChannelControl for InMemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn routing_key(&self) -> &str {
        &self.routing_key
    }

    // Lock order is queue, then stop_at; receive holds the queue lock while
    // it reads stop_at.
    fn stop(&self) {
        {
            let state = self.queue.lock();
            let mut stop_at = self.stop_at.lock().unwrap_or_else(|e| e.into_inner());
            if stop_at.is_none() {
                *stop_at = Some(state.next_seq);
            }
        }
        self.queue.wake();
    }

    fn dispose(&self) {
        {
            let _state = self.queue.lock();
            self.disposed.store(true, Ordering::SeqCst);
        }
        self.queue.wake();
    }
}

impl Channel for InMemoryChannel {
    fn receive(&self, timeout: Duration) -> Result<Option<Message>, ChannelError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.queue.lock();

        loop {
            let wait = match self.poll(&mut state, deadline)? {
                Poll::Ready(message) => return Ok(message),
                Poll::Wait(wait) => wait,
            };

            // Still holding the lock from the take, so a send, requeue, stop
            // or dispose can only land once this thread is waiting
            state = self
                .queue
                .available
                .wait_timeout(state, wait)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }

    fn acknowledge(&self, message: &Message) -> Result<(), ChannelError> {
        self.acknowledge_message(message)
    }

    fn requeue(&self, message: &Message, delay: Duration) -> Result<bool, ChannelError> {
        self.requeue_message(message, delay)
    }

    fn reject(&self, message: &Message) -> Result<bool, ChannelError> {
        self.reject_message(message)
    }

    fn purge(&self) -> Result<(), ChannelError> {
        self.queue.lock().entries.clear();
        Ok(())
    }
}

#[async_trait]
impl AsyncChannel for InMemoryChannel {
    async fn receive_async(&self, timeout: Duration) -> Result<Option<Message>, ChannelError> {
        let deadline = Instant::now() + timeout;

        loop {
            let notified = self.queue.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let poll = {
                let mut state = self.queue.lock();
                self.poll(&mut state, deadline)?
            };
            let wait = match poll {
                Poll::Ready(message) => return Ok(message),
                Poll::Wait(wait) => wait,
            };

            let _ = tokio::time::timeout(wait, notified).await;
        }
    }

    async fn acknowledge_async(&self, message: &Message) -> Result<(), ChannelError> {
        self.acknowledge_message(message)
    }

    async fn requeue_async(&self, message: &Message, delay: Duration) -> Result<bool, ChannelError> {
        self.requeue_message(message, delay)
    }

    async fn reject_async(&self, message: &Message) -> Result<bool, ChannelError> {
        self.reject_message(message)
    }

    async fn purge_async(&self) -> Result<(), ChannelError> {
        self.queue.lock().entries.clear();
        Ok(())
    }
}

/// Channel factory over an `InMemoryBus`.
///
/// Each call creates a new channel on the subscription's routing key, so
/// performers of one subscription compete for the same queue.
#[derive(Clone, Default)]
pub struct InMemoryChannelFactory {
    bus: InMemoryBus,
}

impl InMemoryChannelFactory {
    pub fn new(bus: InMemoryBus) -> Self {
        Self { bus }
    }

    /// The bus channels are created on.
    pub fn bus(&self) -> &InMemoryBus {
        &self.bus
    }
}

impl ChannelFactory for InMemoryChannelFactory {
    fn create_channel(&self, subscription: &Subscription) -> Result<Arc<dyn Channel>, ChannelError> {
        Ok(Arc::new(self.bus.channel(
            subscription.channel_name(),
            subscription.routing_key(),
        )))
    }

    fn create_async_channel(
        &self,
        subscription: &Subscription,
    ) -> Result<Arc<dyn AsyncChannel>, ChannelError> {
        Ok(Arc::new(self.bus.channel(
            subscription.channel_name(),
            subscription.routing_key(),
        )))
    }
}
