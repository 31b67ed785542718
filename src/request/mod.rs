//! Typed application requests.
//!
//! A message mapper turns a [`Message`](crate::message::Message) body into a
//! `Box<dyn Request>`. The request's [`RequestKind`] says whether it is
//! command-like (sent to exactly one handler) or event-like (published to any
//! number of handlers). Handlers are registered per concrete request type and
//! recover it with [`downcast_ref`] / [`downcast_arc`].

use std::any::{Any, TypeId};
use std::fmt::Debug;
use std::sync::Arc;

/// Whether a request is routed with send or publish semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Command,
    Event,
}

/// Type-erasure helpers. Implemented for every `'static` type.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A typed request produced by a message mapper.
///
/// ## Example
///
/// ```
/// use sourced_dispatch::request::{Request, RequestKind};
///
/// #[derive(Debug)]
/// struct OrderPlaced {
///     id: String,
/// }
///
/// impl Request for OrderPlaced {
///     fn id(&self) -> &str {
///         &self.id
///     }
///
///     fn kind(&self) -> RequestKind {
///         RequestKind::Event
///     }
/// }
/// ```
pub trait Request: AsAny + Debug {
    /// Request identifier (usually the originating message id).
    fn id(&self) -> &str;

    /// Command-like or event-like.
    fn kind(&self) -> RequestKind;
}

/// Recover the concrete request type from a borrowed request.
pub fn downcast_ref<R: Request>(request: &dyn Request) -> Option<&R> {
    request.as_any().downcast_ref::<R>()
}

/// Recover the concrete request type from a shared request.
pub fn downcast_arc<R: Request>(request: Arc<dyn Request>) -> Option<Arc<R>> {
    request.into_any_arc().downcast::<R>().ok()
}

/// `TypeId` of the concrete request behind a type-erased request.
pub fn request_type_id(request: &dyn Request) -> TypeId {
    request.as_any().type_id()
}

/// Concrete type name of a type-erased request, for diagnostics.
pub fn request_type_name(request: &dyn Request) -> &'static str {
    request.type_name()
}
