//! Command processor: an explicit registration table of request handlers.
//!
//! A `CommandProcessor` maps each concrete request type to the handlers
//! registered for it. Commands are routed with `send` (exactly one handler),
//! events with `publish` (zero or more handlers, failures aggregated).
//!
//! ## Example
//!
//! ```ignore
//! use sourced_dispatch::processor::{CommandProcessor, HandlerError};
//!
//! let processor = CommandProcessor::new()
//!     .handle::<PlaceOrder, _>(|cmd| {
//!         // load aggregate, apply, commit
//!         Ok(())
//!     })
//!     .handle::<OrderPlaced, _>(|evt| Ok(()))
//!     .handle_async::<OrderPlaced, _, _>(|evt| async move { Ok(()) });
//! ```

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::error::HandlerError;
use super::processor::{AsyncRequestProcessor, RequestProcessor};
use crate::request::{downcast_arc, downcast_ref, request_type_id, request_type_name, Request};

/// Boxed future returned by async handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

type BlockingHandler = Arc<dyn Fn(&dyn Request) -> Result<(), HandlerError> + Send + Sync>;
type SuspendingHandler = Arc<dyn Fn(Arc<dyn Request>) -> HandlerFuture + Send + Sync>;

#[derive(Clone)]
enum Handler {
    Blocking(BlockingHandler),
    Suspending(SuspendingHandler),
}

/// A registry of request handlers keyed by request type.
#[derive(Clone, Default)]
pub struct CommandProcessor {
    handlers: HashMap<TypeId, Vec<Handler>>,
    names: HashMap<TypeId, &'static str>,
}

impl CommandProcessor {
    /// Create an empty processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a blocking handler for requests of type `R`.
    ///
    /// Uses builder pattern, returns `self` for chaining.
    pub fn handle<R, F>(self, handler: F) -> Self
    where
        R: Request,
        F: Fn(&R) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let erased: BlockingHandler = Arc::new(move |request: &dyn Request| {
            let typed = downcast_ref::<R>(request).ok_or_else(|| mismatch::<R>(request))?;
            handler(typed)
        });
        self.register::<R>(Handler::Blocking(erased))
    }

    /// Register an async handler for requests of type `R`.
    ///
    /// Async handlers only run on reactor pumps; reaching one from `send` or
    /// `publish` fails with `HandlerError::AsyncHandler`.
    pub fn handle_async<R, F, Fut>(self, handler: F) -> Self
    where
        R: Request,
        F: Fn(Arc<R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let erased: SuspendingHandler = Arc::new(move |request: Arc<dyn Request>| -> HandlerFuture {
            let received = request_type_name(&*request);
            match downcast_arc::<R>(request) {
                Some(typed) => Box::pin(handler(typed)),
                None => {
                    let err = HandlerError::Configuration(format!(
                        "handler for {} received {}",
                        type_name::<R>(),
                        received
                    ));
                    Box::pin(async move { Err(err) })
                }
            }
        });
        self.register::<R>(Handler::Suspending(erased))
    }

    fn register<R: Request>(mut self, handler: Handler) -> Self {
        let id = TypeId::of::<R>();
        self.handlers.entry(id).or_default().push(handler);
        self.names.insert(id, type_name::<R>());
        self
    }

    /// Number of handlers registered for `R`.
    pub fn handler_count<R: Request>(&self) -> usize {
        self.handlers
            .get(&TypeId::of::<R>())
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Names of all request types with at least one handler.
    pub fn request_types(&self) -> Vec<&'static str> {
        self.names.values().copied().collect()
    }

    fn handlers_for(&self, request: &dyn Request) -> &[Handler] {
        self.handlers
            .get(&request_type_id(request))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn single_handler(&self, request: &dyn Request) -> Result<Handler, HandlerError> {
        match self.handlers_for(request) {
            [handler] => Ok(handler.clone()),
            [] => Err(HandlerError::NoHandler(request_type_name(request).to_string())),
            many => Err(HandlerError::MultipleHandlers {
                request_type: request_type_name(request).to_string(),
                count: many.len(),
            }),
        }
    }
}

fn mismatch<R: Request>(request: &dyn Request) -> HandlerError {
    HandlerError::Configuration(format!(
        "handler for {} received {}",
        type_name::<R>(),
        request_type_name(request)
    ))
}

impl RequestProcessor for CommandProcessor {
    fn send(&self, request: &dyn Request) -> Result<(), HandlerError> {
        debug!(request_id = request.id(), request_type = request_type_name(request), "send");
        match self.single_handler(request)? {
            Handler::Blocking(handler) => handler(request),
            Handler::Suspending(_) => Err(HandlerError::AsyncHandler(
                request_type_name(request).to_string(),
            )),
        }
    }

    fn publish(&self, request: &dyn Request) -> Result<(), HandlerError> {
        let handlers = self.handlers_for(request);
        debug!(
            request_id = request.id(),
            request_type = request_type_name(request),
            handlers = handlers.len(),
            "publish"
        );

        let mut errors = Vec::new();
        for handler in handlers {
            let result = match handler {
                Handler::Blocking(handler) => handler(request),
                Handler::Suspending(_) => Err(HandlerError::AsyncHandler(
                    request_type_name(request).to_string(),
                )),
            };
            if let Err(e) = result {
                errors.push(e);
            }
        }

        match HandlerError::aggregate(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AsyncRequestProcessor for CommandProcessor {
    async fn send_async(&self, request: Arc<dyn Request>) -> Result<(), HandlerError> {
        debug!(request_id = request.id(), request_type = request_type_name(&*request), "send async");
        match self.single_handler(&*request)? {
            Handler::Blocking(handler) => handler(&*request),
            Handler::Suspending(handler) => handler(request).await,
        }
    }

    async fn publish_async(&self, request: Arc<dyn Request>) -> Result<(), HandlerError> {
        let handlers = self.handlers_for(&*request).to_vec();
        debug!(
            request_id = request.id(),
            request_type = request_type_name(&*request),
            handlers = handlers.len(),
            "publish async"
        );

        let mut errors = Vec::new();
        for handler in handlers {
            let result = match handler {
                Handler::Blocking(handler) => handler(&*request),
                Handler::Suspending(handler) => handler(Arc::clone(&request)).await,
            };
            if let Err(e) = result {
                errors.push(e);
            }
        }

        match HandlerError::aggregate(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
