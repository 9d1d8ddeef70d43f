use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::processor::IssueOutcome;

/// Terminal outcome of one source within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source: String,
    pub outcome: IssueOutcome,
}

/// Result of one run over all sources, in processing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<SourceOutcome>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| o.outcome.is_failed())
    }

    pub fn failed_sources(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.outcome.is_failed())
            .map(|o| o.source.as_str())
            .collect()
    }

    /// Number of sources per outcome label.
    pub fn count(&self, label: &str) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome.label() == label)
            .count()
    }

    /// One line per source, for the end-of-run log.
    pub fn summary_lines(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .map(|o| format!("{}: {}", o.source, o.outcome))
            .collect()
    }
}
