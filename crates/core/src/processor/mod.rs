//! Per-issue state machine.
//!
//! One invocation of [`IssueProcessor::process`] takes a source through
//! resolve, lock, dedup check, acquisition, preview, persistence and
//! recording, and always ends with exactly one scratch cleanup. Fan-out
//! sources skip the per-issue dedup check and persist their items themselves
//! through a [`FanOutContext`](crate::source::FanOutContext).

mod issue;
mod types;

pub use issue::{IssueProcessor, ProcessorSettings};
pub use types::{CompletionDetail, IssueOutcome, ProcessError, Stage};

pub(crate) use issue::panic_message;
