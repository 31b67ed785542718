//! Request processor: routing typed requests to their handlers.
//!
//! Message pumps hand every mapped request to a processor:
//! - [`RequestProcessor`]: blocking `send` / `publish`, used by thread pumps
//! - [`AsyncRequestProcessor`]: suspending `send_async` / `publish_async`,
//!   used by reactor pumps
//!
//! [`CommandProcessor`] implements both over an explicit registration table
//! (request type → handlers). Retry and circuit-breaker pipelines belong in
//! processors layered on top of these traits.

mod command_processor;
mod error;
#[allow(clippy::module_inception)]
mod processor;

pub use command_processor::{CommandProcessor, HandlerFuture};
pub use error::HandlerError;
pub use processor::{AsyncRequestProcessor, RequestProcessor};
