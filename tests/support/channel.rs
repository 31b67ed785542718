//! A channel double whose receives fail like an unreachable broker, or like
//! one that refuses the consumer outright.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sourced_dispatch::channel::{
    AsyncChannel, Channel, ChannelControl, ChannelError, InMemoryChannel,
};
use sourced_dispatch::message::Message;

pub struct FailingChannel {
    inner: InMemoryChannel,
    failures_left: AtomicUsize,
    failures_seen: AtomicUsize,
    error: ChannelError,
}

impl FailingChannel {
    /// Fail the next `failures` receives, then behave like `inner`.
    pub fn new(inner: InMemoryChannel, failures: usize) -> Self {
        Self {
            inner,
            failures_left: AtomicUsize::new(failures),
            failures_seen: AtomicUsize::new(0),
            error: ChannelError::Failure("broker unreachable".into()),
        }
    }

    /// Fail every receive with `error`.
    pub fn broken(inner: InMemoryChannel, error: ChannelError) -> Self {
        Self {
            error,
            ..Self::new(inner, usize::MAX)
        }
    }

    pub fn failures_seen(&self) -> usize {
        self.failures_seen.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &InMemoryChannel {
        &self.inner
    }

    fn fail(&self) -> Result<(), ChannelError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            self.failures_seen.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        } else {
            Ok(())
        }
    }
}

impl ChannelControl for FailingChannel {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn routing_key(&self) -> &str {
        self.inner.routing_key()
    }

    fn stop(&self) {
        self.inner.stop()
    }

    fn dispose(&self) {
        self.inner.dispose()
    }
}

impl Channel for FailingChannel {
    fn receive(&self, timeout: Duration) -> Result<Option<Message>, ChannelError> {
        self.fail()?;
        self.inner.receive(timeout)
    }

    fn acknowledge(&self, message: &Message) -> Result<(), ChannelError> {
        self.inner.acknowledge(message)
    }

    fn requeue(&self, message: &Message, delay: Duration) -> Result<bool, ChannelError> {
        self.inner.requeue(message, delay)
    }

    fn reject(&self, message: &Message) -> Result<bool, ChannelError> {
        self.inner.reject(message)
    }

    fn purge(&self) -> Result<(), ChannelError> {
        self.inner.purge()
    }
}

#[async_trait]
impl AsyncChannel for FailingChannel {
    async fn receive_async(&self, timeout: Duration) -> Result<Option<Message>, ChannelError> {
        self.fail()?;
        self.inner.receive_async(timeout).await
    }

    async fn acknowledge_async(&self, message: &Message) -> Result<(), ChannelError> {
        self.inner.acknowledge_async(message).await
    }

    async fn requeue_async(&self, message: &Message, delay: Duration) -> Result<bool, ChannelError> {
        self.inner.requeue_async(message, delay).await
    }

    async fn reject_async(&self, message: &Message) -> Result<bool, ChannelError> {
        self.inner.reject_async(message).await
    }

    async fn purge_async(&self) -> Result<(), ChannelError> {
        self.inner.purge_async().await
    }
}
