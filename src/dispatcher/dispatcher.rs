use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::thread::{self, JoinHandle};

use tokio::runtime::{Handle, Runtime};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::builder::DispatcherBuilder;
use super::error::DispatcherError;
use super::status::{ConsumerInfo, DispatcherState, JobReport, SubscriptionStatus};
use crate::consumer::Consumer;
use crate::mapper::{MessageMapper, MessageMapperRegistry};
use crate::performer::{Performer, PerformerChannel};
use crate::processor::{AsyncRequestProcessor, RequestProcessor};
use crate::pump::{PumpSettings, ReactorPump, ThreadPump};
use crate::subscription::{MessagePumpType, Subscription};

struct Inner {
    state: DispatcherState,
    consumers: Vec<Consumer>,
    /// Reports of consumers that exited on their own, until `reap_finished`.
    exited: Vec<JobReport>,
}

#[derive(Default)]
struct Signal {
    exited: bool,
    shutdown: bool,
}

/// The live consumer set, shared between the dispatcher and its supervisor.
struct Live {
    control: Mutex<()>,
    inner: RwLock<Inner>,
    signal: Mutex<Signal>,
    wake: Condvar,
}

impl Live {
    fn new() -> Self {
        Self {
            control: Mutex::new(()),
            inner: RwLock::new(Inner {
                state: DispatcherState::Awaiting,
                consumers: Vec::new(),
                exited: Vec::new(),
            }),
            signal: Mutex::new(Signal::default()),
            wake: Condvar::new(),
        }
    }

    /// Called from a pump's worker when its job exits.
    fn job_exited(&self) {
        self.lock_signal().exited = true;
        self.wake.notify_all();
    }

    fn shutdown(&self) {
        self.lock_signal().shutdown = true;
        self.wake.notify_all();
    }

    /// Block until a job exits. Returns false once shutdown was requested.
    fn wait_for_exit(&self) -> bool {
        let mut signal = self.lock_signal();
        while !signal.exited && !signal.shutdown {
            signal = self.wake.wait(signal).unwrap_or_else(|e| e.into_inner());
        }
        signal.exited = false;
        !signal.shutdown
    }

    /// Remove and dispose consumers whose job has exited, keep their reports,
    /// and settle the state.
    fn reap(&self) {
        let _control = self.lock_control();
        let finished = {
            let mut inner = self.write();
            let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.consumers)
                .into_iter()
                .partition(Consumer::is_finished);
            inner.consumers = running;
            finished
        };
        if finished.is_empty() {
            return;
        }

        let reports = finish(finished);
        for report in &reports {
            info!(
                consumer = %report.consumer,
                subscription = %report.subscription,
                faulted = report.is_faulted(),
                "consumer exited, removed from live set"
            );
        }
        self.write().exited.extend(reports);
        self.settle_state();
    }

    /// Running while any consumer is live; Stopped once all are gone.
    fn settle_state(&self) {
        let mut inner = self.write();
        let next = if !inner.consumers.is_empty() {
            DispatcherState::Running
        } else if inner.state == DispatcherState::Awaiting {
            DispatcherState::Awaiting
        } else {
            DispatcherState::Stopped
        };
        if next != inner.state {
            info!(from = %inner.state, to = %next, "dispatcher state changed");
            inner.state = next;
        }
    }

    fn lock_control(&self) -> MutexGuard<'_, ()> {
        self.control.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_signal(&self) -> MutexGuard<'_, Signal> {
        self.signal.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Reap consumers as their jobs exit, until the dispatcher is dropped.
fn supervise(live: Arc<Live>) {
    while live.wait_for_exit() {
        live.reap();
    }
    debug!("dispatcher supervisor exiting");
}

/// Supervises every subscription and its live consumers.
///
/// The configured subscriptions never change; only the live consumer set
/// grows and shrinks as subscriptions are opened and shut. Control calls
/// (`start`, `stop`, `open_subscription`, `shut_subscription`,
/// `reap_finished`) are serialised; reads may run alongside them.
///
/// A supervisor thread removes and disposes consumers whose job exits on its
/// own (quit seen, unacceptable limit reached, or a fault). Once the last one
/// is gone the state becomes `Stopped`. Their reports wait for
/// [`Dispatcher::reap_finished`].
///
/// `stop` and `shut_subscription` block until the affected pumps exit, so
/// call them from a plain thread rather than from a task on the runtime the
/// reactor pumps use.
///
/// ## Example
///
/// ```ignore
/// let dispatcher = Dispatcher::builder()
///     .processor(CommandProcessor::new().handle::<OrderPlaced, _>(on_order_placed))
///     .mappers(MessageMapperRegistry::new().json::<OrderPlaced>("OrderPlaced"))
///     .subscription(Subscription::new("orders", "orders.placed", "OrderPlaced", factory))
///     .build()?;
///
/// dispatcher.start()?;
/// assert_eq!(dispatcher.state(), DispatcherState::Running);
///
/// dispatcher.shut_subscription("orders")?;
/// dispatcher.open_subscription("orders")?;
///
/// dispatcher.stop();
/// ```
pub struct Dispatcher {
    subscriptions: Vec<Subscription>,
    mappers: MessageMapperRegistry,
    processor: Option<Arc<dyn RequestProcessor>>,
    async_processor: Option<Arc<dyn AsyncRequestProcessor>>,
    runtime: Option<Handle>,
    owned_runtime: Option<Runtime>,
    live: Arc<Live>,
    supervisor: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub(crate) fn from_parts(
        subscriptions: Vec<Subscription>,
        mappers: MessageMapperRegistry,
        processor: Option<Arc<dyn RequestProcessor>>,
        async_processor: Option<Arc<dyn AsyncRequestProcessor>>,
        runtime: Option<Handle>,
        owned_runtime: Option<Runtime>,
    ) -> Result<Self, DispatcherError> {
        let live = Arc::new(Live::new());
        let supervisor = {
            let live = Arc::clone(&live);
            thread::Builder::new()
                .name("dispatcher-supervisor".to_string())
                .spawn(move || supervise(live))
                .map_err(|e| DispatcherError::Spawn(e.to_string()))?
        };

        Ok(Self {
            subscriptions,
            mappers,
            processor,
            async_processor,
            runtime,
            owned_runtime,
            live,
            supervisor: Some(supervisor),
        })
    }

    /// Overall run state.
    pub fn state(&self) -> DispatcherState {
        self.live.read().state
    }

    /// The configured subscriptions.
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Look up a configured subscription by name.
    pub fn subscription(&self, name: &str) -> Result<&Subscription, DispatcherError> {
        self.subscriptions
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| DispatcherError::SubscriptionNotFound(name.to_string()))
    }

    /// Snapshot of the live consumers.
    pub fn consumers(&self) -> Vec<ConsumerInfo> {
        self.live.read().consumers.iter().map(ConsumerInfo::from).collect()
    }

    /// Number of live consumers.
    pub fn consumer_count(&self) -> usize {
        self.live.read().consumers.len()
    }

    /// Configured performers against live consumers, per subscription.
    pub fn status(&self) -> Vec<SubscriptionStatus> {
        let inner = self.live.read();
        self.subscriptions
            .iter()
            .map(|subscription| SubscriptionStatus {
                name: subscription.name().to_string(),
                pump_type: subscription.pump_type(),
                configured_performers: subscription.no_of_performers(),
                consumers: inner
                    .consumers
                    .iter()
                    .filter(|c| c.subscription() == subscription.name())
                    .map(ConsumerInfo::from)
                    .collect(),
            })
            .collect()
    }

    /// Open every subscription that has no running consumers.
    ///
    /// Subscriptions that are already running are left alone.
    pub fn start(&self) -> Result<(), DispatcherError> {
        let _control = self.live.lock_control();
        info!(subscriptions = self.subscriptions.len(), "dispatcher starting");

        let result = self
            .subscriptions
            .iter()
            .try_for_each(|subscription| self.open(subscription).map(|_| ()));

        self.live.settle_state();
        result
    }

    /// Shut every consumer, wait for all of them to exit, and clear the
    /// live set.
    pub fn stop(&self) -> Vec<JobReport> {
        let _control = self.live.lock_control();
        info!("dispatcher stopping");

        let consumers = {
            let mut inner = self.live.write();
            for consumer in inner.consumers.iter_mut() {
                consumer.shut();
            }
            std::mem::take(&mut inner.consumers)
        };
        let reports = finish(consumers);

        self.live.write().state = DispatcherState::Stopped;
        info!(consumers = reports.len(), "dispatcher stopped");
        reports
    }

    /// Shut the consumers of one subscription and remove them from the live
    /// set. The subscription stays configured and can be reopened.
    pub fn shut_subscription(&self, name: &str) -> Result<Vec<JobReport>, DispatcherError> {
        self.subscription(name)?;
        let _control = self.live.lock_control();
        info!(subscription = %name, "shutting subscription");

        let consumers = {
            let mut inner = self.live.write();
            let (mut matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.consumers)
                .into_iter()
                .partition(|c| c.subscription() == name);
            inner.consumers = rest;
            for consumer in matching.iter_mut() {
                consumer.shut();
            }
            matching
        };
        let reports = finish(consumers);

        self.live.settle_state();
        Ok(reports)
    }

    /// Create fresh consumers for a configured subscription and open them.
    ///
    /// A no-op if the subscription already has running consumers.
    pub fn open_subscription(&self, name: &str) -> Result<(), DispatcherError> {
        let subscription = self.subscription(name)?;
        let _control = self.live.lock_control();
        info!(subscription = %name, "opening subscription");

        let result = self.open(subscription).map(|_| ());
        self.live.settle_state();
        result
    }

    /// Reports of consumers whose job exited on its own (quit seen,
    /// unacceptable limit reached, or a fatal error) since the last call.
    ///
    /// The supervisor normally has removed them already; any it has not got
    /// to yet are reaped here first.
    pub fn reap_finished(&self) -> Vec<JobReport> {
        self.live.reap();
        std::mem::take(&mut self.live.write().exited)
    }

    /// Open `no_of_performers` consumers unless the subscription is running.
    fn open(&self, subscription: &Subscription) -> Result<usize, DispatcherError> {
        let stale = {
            let mut inner = self.live.write();
            let running = inner.consumers.iter().any(|c| {
                c.subscription() == subscription.name() && c.is_open() && !c.is_finished()
            });
            if running {
                return Ok(0);
            }
            let (stale, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.consumers)
                .into_iter()
                .partition(|c| c.subscription() == subscription.name());
            inner.consumers = rest;
            stale
        };
        if !stale.is_empty() {
            let reports = finish(stale);
            self.live.write().exited.extend(reports);
        }

        let mapper = self
            .mappers
            .get(subscription.request_type())
            .map_err(|_| DispatcherError::NoMapper {
                subscription: subscription.name().to_string(),
                request_type: subscription.request_type().to_string(),
            })?;

        let mut opened = Vec::with_capacity(subscription.no_of_performers());
        for _ in 0..subscription.no_of_performers() {
            match self.open_consumer(subscription, Arc::clone(&mapper)) {
                Ok(consumer) => opened.push(consumer),
                Err(err) => {
                    error!(subscription = %subscription.name(), error = %err, "failed to open consumer");
                    for consumer in opened.iter_mut() {
                        consumer.shut();
                    }
                    finish(opened);
                    return Err(err);
                }
            }
        }

        let count = opened.len();
        self.live.write().consumers.extend(opened);
        info!(
            subscription = %subscription.name(),
            consumers = count,
            pump = ?subscription.pump_type(),
            "subscription opened"
        );
        Ok(count)
    }

    fn open_consumer(
        &self,
        subscription: &Subscription,
        mapper: Arc<dyn MessageMapper>,
    ) -> Result<Consumer, DispatcherError> {
        let performer = self.create_performer(subscription, mapper)?;
        let name = format!("{}-{}", subscription.name(), Uuid::new_v4());
        let mut consumer = Consumer::new(name, subscription.name(), performer);
        match consumer.open() {
            Ok(job) => {
                let live: Weak<Live> = Arc::downgrade(&self.live);
                job.on_finish(move || {
                    if let Some(live) = live.upgrade() {
                        live.job_exited();
                    }
                });
                Ok(consumer)
            }
            Err(err) => {
                consumer.dispose();
                Err(err.into())
            }
        }
    }

    fn create_performer(
        &self,
        subscription: &Subscription,
        mapper: Arc<dyn MessageMapper>,
    ) -> Result<Performer, DispatcherError> {
        let settings = PumpSettings::from_subscription(subscription);
        let factory = subscription.channel_factory();

        match subscription.pump_type() {
            MessagePumpType::Thread => {
                let processor = self
                    .processor
                    .clone()
                    .ok_or_else(|| DispatcherError::NoProcessor("blocking".to_string()))?;
                let channel = factory.create_channel(subscription)?;
                let pump = ThreadPump::new(settings, Arc::clone(&channel), mapper, processor);
                Ok(Performer::new(PerformerChannel::Blocking(channel), Box::new(pump)))
            }
            MessagePumpType::Reactor => {
                let processor = self
                    .async_processor
                    .clone()
                    .ok_or_else(|| DispatcherError::NoProcessor("async".to_string()))?;
                let runtime = self
                    .runtime
                    .clone()
                    .ok_or_else(|| DispatcherError::NoRuntime(subscription.name().to_string()))?;
                let channel = factory.create_async_channel(subscription)?;
                let pump = ReactorPump::new(settings, Arc::clone(&channel), mapper, processor, runtime);
                Ok(Performer::new(PerformerChannel::Async(channel), Box::new(pump)))
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        for consumer in self.live.write().consumers.iter_mut() {
            consumer.shut();
        }
        self.live.shutdown();
        if let Some(supervisor) = self.supervisor.take() {
            let _ = supervisor.join();
        }
        // Don't wait on the pumps - let them see their quit and finish
        if let Some(runtime) = self.owned_runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Wait for each consumer's job, dispose it, and report the outcome.
fn finish(consumers: Vec<Consumer>) -> Vec<JobReport> {
    consumers
        .into_iter()
        .map(|mut consumer| {
            let outcome = consumer.wait();
            consumer.dispose();
            if let Some(Err(err)) = &outcome {
                warn!(consumer = %consumer.name(), error = %err, "consumer job faulted");
            }
            JobReport {
                consumer: consumer.name().to_string(),
                subscription: consumer.subscription().to_string(),
                job: consumer.job_id(),
                outcome,
            }
        })
        .collect()
}
