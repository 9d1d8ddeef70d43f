//! Run coordination.
//!
//! Drives every configured source through the issue processor, one after
//! another. A source that errors or panics is reported as failed and the run
//! moves on to the next one.

mod runner;
mod types;

pub use runner::RunCoordinator;
pub use types::{RunReport, SourceOutcome};
