use std::panic::AssertUnwindSafe;

use chrono::Utc;
use futures::FutureExt;
use tracing::{error, info};

use crate::metrics;
use crate::processor::{panic_message, IssueOutcome, IssueProcessor, Stage};
use crate::source::Source;

use super::types::{RunReport, SourceOutcome};

/// Runs the issue processor over a list of sources.
#[derive(Clone)]
pub struct RunCoordinator {
    processor: IssueProcessor,
}

impl RunCoordinator {
    pub fn new(processor: IssueProcessor) -> Self {
        Self { processor }
    }

    /// Processes every source in order, isolating failures per source.
    pub async fn run_all(&self, sources: &[Source]) -> RunReport {
        let started_at = Utc::now();
        info!("Starting run over {} sources", sources.len());

        let mut outcomes = Vec::with_capacity(sources.len());
        for source in sources {
            info!("Processing source {}", source.id);

            let outcome = match AssertUnwindSafe(self.processor.process(source))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let message = panic_message(&*panic);
                    error!("Source {} panicked: {}", source.id, message);
                    metrics::ISSUE_OUTCOMES
                        .with_label_values(&[source.id.as_str(), "failed"])
                        .inc();
                    IssueOutcome::Failed {
                        issue: None,
                        stage: Stage::Acquire,
                        error: format!("panicked: {}", message),
                    }
                }
            };

            outcomes.push(SourceOutcome {
                source: source.id.clone(),
                outcome,
            });
        }

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        info!(
            "Run finished: {} completed, {} degraded, {} skipped, {} failed",
            report.count("completed"),
            report.count("degraded"),
            report.count("skipped_locked") + report.count("skipped_duplicate"),
            report.count("failed")
        );
        report
    }
}
