//! Performers: one message pump hosted as a restartable, stoppable worker.

mod error;
#[allow(clippy::module_inception)]
mod performer;

pub use error::PerformerError;
pub use performer::{Performer, PerformerChannel};
