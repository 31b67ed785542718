use std::collections::HashSet;
use std::sync::Arc;

use tokio::runtime::{Handle, Runtime};

use super::dispatcher::Dispatcher;
use super::error::DispatcherError;
use crate::channel::ChannelFactory;
use crate::mapper::MessageMapperRegistry;
use crate::processor::{AsyncRequestProcessor, RequestProcessor};
use crate::subscription::{ConfigError, DispatcherConfig, MessagePumpType, Subscription};

/// Collects what a dispatcher needs and checks it fits together.
///
/// `build()` rejects duplicate subscription names, subscriptions whose
/// request type has no mapper, and pump types with no matching processor.
/// Reactor subscriptions run on the runtime passed to [`runtime`](Self::runtime),
/// or on a multi-thread runtime the dispatcher owns.
#[derive(Default)]
pub struct DispatcherBuilder {
    subscriptions: Vec<Subscription>,
    mappers: MessageMapperRegistry,
    processor: Option<Arc<dyn RequestProcessor>>,
    async_processor: Option<Arc<dyn AsyncRequestProcessor>>,
    runtime: Option<Handle>,
    reactor_threads: Option<usize>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use one processor for both thread and reactor pumps.
    pub fn processor<P>(mut self, processor: P) -> Self
    where
        P: RequestProcessor + AsyncRequestProcessor + 'static,
    {
        let processor = Arc::new(processor);
        self.processor = Some(processor.clone());
        self.async_processor = Some(processor);
        self
    }

    /// Processor for thread pumps.
    pub fn blocking_processor(mut self, processor: Arc<dyn RequestProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Processor for reactor pumps.
    pub fn async_processor(mut self, processor: Arc<dyn AsyncRequestProcessor>) -> Self {
        self.async_processor = Some(processor);
        self
    }

    pub fn mappers(mut self, mappers: MessageMapperRegistry) -> Self {
        self.mappers = mappers;
        self
    }

    pub fn subscription(mut self, subscription: Subscription) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    pub fn subscriptions(mut self, subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        self.subscriptions.extend(subscriptions);
        self
    }

    /// Add every subscription in a loaded config, all drawing channels from
    /// `channel_factory`.
    pub fn config(
        mut self,
        config: DispatcherConfig,
        channel_factory: Arc<dyn ChannelFactory>,
    ) -> Result<Self, ConfigError> {
        for settings in config.subscriptions {
            self.subscriptions.push(Subscription::from_settings(
                settings,
                Arc::clone(&channel_factory),
            )?);
        }
        Ok(self)
    }

    /// Run reactor pumps on an existing runtime.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Worker threads for the owned reactor runtime (default: tokio's).
    pub fn reactor_threads(mut self, threads: usize) -> Self {
        self.reactor_threads = Some(threads);
        self
    }

    pub fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut names = HashSet::new();
        for subscription in &self.subscriptions {
            subscription.settings().validate()?;
            if !names.insert(subscription.name()) {
                return Err(ConfigError::Duplicate(subscription.name().to_string()).into());
            }
            if !self.mappers.contains(subscription.request_type()) {
                return Err(DispatcherError::NoMapper {
                    subscription: subscription.name().to_string(),
                    request_type: subscription.request_type().to_string(),
                });
            }
        }

        let uses = |pump_type: MessagePumpType| {
            self.subscriptions
                .iter()
                .any(|s| s.pump_type() == pump_type)
        };
        if uses(MessagePumpType::Thread) && self.processor.is_none() {
            return Err(DispatcherError::NoProcessor("blocking".to_string()));
        }
        let has_reactor = uses(MessagePumpType::Reactor);
        if has_reactor && self.async_processor.is_none() {
            return Err(DispatcherError::NoProcessor("async".to_string()));
        }

        let (runtime, owned_runtime) = match self.runtime {
            Some(handle) => (Some(handle), None),
            None if has_reactor => {
                let runtime = build_runtime(self.reactor_threads)?;
                (Some(runtime.handle().clone()), Some(runtime))
            }
            None => (None, None),
        };

        Dispatcher::from_parts(
            self.subscriptions,
            self.mappers,
            self.processor,
            self.async_processor,
            runtime,
            owned_runtime,
        )
    }
}

fn build_runtime(reactor_threads: Option<usize>) -> Result<Runtime, DispatcherError> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all().thread_name("reactor-pump");
    if let Some(threads) = reactor_threads {
        builder.worker_threads(threads);
    }
    builder
        .build()
        .map_err(|e| DispatcherError::NoRuntime(e.to_string()))
}
