use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dedup::DedupPayload;
use crate::source::FanOutReport;

/// Step of the issue state machine at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Resolve,
    Lock,
    Dedup,
    Acquire,
    Finalize,
    Persist,
    Record,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Resolve => "resolve",
            Stage::Lock => "lock",
            Stage::Dedup => "dedup",
            Stage::Acquire => "acquire",
            Stage::Finalize => "finalize",
            Stage::Persist => "persist",
            Stage::Record => "record",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal error for one issue, tagged with the stage that raised it.
#[derive(Debug, Clone, Error)]
#[error("{stage} failed: {message}")]
pub struct ProcessError {
    pub stage: Stage,
    pub message: String,
}

impl ProcessError {
    pub fn new(stage: Stage, error: impl fmt::Display) -> Self {
        Self {
            stage,
            message: error.to_string(),
        }
    }
}

/// What a completed invocation produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompletionDetail {
    /// One issue persisted and recorded.
    Single { issue: String, payload: DedupPayload },
    /// A fan-out pass finished; zero new issues is still success.
    FanOut { issue: String, report: FanOutReport },
    /// The fan-out collaborator raised; nothing beyond what it already
    /// recorded was stored.
    FanOutDegraded { issue: String, reason: String },
}

/// Terminal state of one issue processor invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IssueOutcome {
    Completed(CompletionDetail),
    /// Another holder owns the lock.
    SkippedLocked { issue: String },
    /// A completion record already exists.
    SkippedDuplicate { issue: String },
    Failed {
        /// `None` when the issue id could not be resolved.
        issue: Option<String>,
        stage: Stage,
        error: String,
    },
}

impl IssueOutcome {
    pub(crate) fn failed(issue: Option<&str>, error: ProcessError) -> Self {
        IssueOutcome::Failed {
            issue: issue.map(str::to_string),
            stage: error.stage,
            error: error.message,
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            IssueOutcome::Completed(CompletionDetail::FanOutDegraded { .. }) => "degraded",
            IssueOutcome::Completed(_) => "completed",
            IssueOutcome::SkippedLocked { .. } => "skipped_locked",
            IssueOutcome::SkippedDuplicate { .. } => "skipped_duplicate",
            IssueOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, IssueOutcome::Failed { .. })
    }

    pub fn issue(&self) -> Option<&str> {
        match self {
            IssueOutcome::Completed(CompletionDetail::Single { issue, .. })
            | IssueOutcome::Completed(CompletionDetail::FanOut { issue, .. })
            | IssueOutcome::Completed(CompletionDetail::FanOutDegraded { issue, .. })
            | IssueOutcome::SkippedLocked { issue }
            | IssueOutcome::SkippedDuplicate { issue } => Some(issue),
            IssueOutcome::Failed { issue, .. } => issue.as_deref(),
        }
    }
}

impl fmt::Display for IssueOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueOutcome::Completed(CompletionDetail::Single { issue, payload }) => {
                write!(f, "completed {} -> {}", issue, payload.primary.uri())
            }
            IssueOutcome::Completed(CompletionDetail::FanOut { issue, report }) => write!(
                f,
                "completed {} ({} new, {} already recorded, {} failed)",
                issue, report.new_issues, report.already_recorded, report.failed_items
            ),
            IssueOutcome::Completed(CompletionDetail::FanOutDegraded { issue, reason }) => {
                write!(f, "degraded {}: {}", issue, reason)
            }
            IssueOutcome::SkippedLocked { issue } => write!(f, "skipped {} (locked)", issue),
            IssueOutcome::SkippedDuplicate { issue } => {
                write!(f, "skipped {} (already downloaded)", issue)
            }
            IssueOutcome::Failed {
                issue,
                stage,
                error,
            } => write!(
                f,
                "failed {} at {}: {}",
                issue.as_deref().unwrap_or("<unresolved>"),
                stage,
                error
            ),
        }
    }
}
