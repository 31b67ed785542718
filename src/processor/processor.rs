//! Request processor traits consumed by the message pumps.

use std::sync::Arc;

use async_trait::async_trait;

use super::error::HandlerError;
use crate::request::Request;

/// Blocking request routing, used by thread pumps.
///
/// Implementations might include:
/// - `CommandProcessor` - explicit handler table (included)
/// - a pipeline with retry / circuit-breaker policies (external)
pub trait RequestProcessor: Send + Sync {
    /// Route a command to exactly one handler.
    ///
    /// Fails with `NoHandler` / `MultipleHandlers` if the handler count is not one.
    fn send(&self, request: &dyn Request) -> Result<(), HandlerError>;

    /// Fan an event out to every registered handler (zero or more).
    ///
    /// Per-handler failures are aggregated into a single error.
    fn publish(&self, request: &dyn Request) -> Result<(), HandlerError>;
}

/// Suspending request routing, used by reactor pumps.
#[async_trait]
pub trait AsyncRequestProcessor: Send + Sync {
    /// Route a command to exactly one handler.
    async fn send_async(&self, request: Arc<dyn Request>) -> Result<(), HandlerError>;

    /// Fan an event out to every registered handler.
    async fn publish_async(&self, request: Arc<dyn Request>) -> Result<(), HandlerError>;
}
