use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::artifact::ArtifactStore;
use crate::config::Config;
use crate::dedup::{DedupPayload, DedupStore, StoredArtifact};
use crate::issue_key::IssueKey;
use crate::lock::LockService;
use crate::metrics;
use crate::preview::PreviewBuilder;
use crate::scratch::ScratchCleaner;
use crate::source::{Acquisition, FanOutContext, FanOutSource, SingleIssueSource, Source};

use super::types::{CompletionDetail, IssueOutcome, ProcessError, Stage};

/// Tunables of the issue processor.
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub lock_ttl: Duration,
    pub retention: Duration,
    /// Per-invocation scratch directories are created below this.
    pub scratch_root: PathBuf,
    /// Report a raising fan-out collaborator as `Failed` instead of
    /// `Completed(FanOutDegraded)`.
    pub fan_out_errors_are_failures: bool,
}

impl ProcessorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            lock_ttl: config.lock.ttl(),
            retention: config.dedup.retention(),
            scratch_root: config.paths.scratch_root(),
            fan_out_errors_are_failures: config.runner.fan_out_errors_are_failures,
        }
    }
}

/// Drives one source through a single issue.
#[derive(Clone)]
pub struct IssueProcessor {
    locks: LockService,
    dedup: DedupStore,
    artifacts: ArtifactStore,
    preview: Option<Arc<dyn PreviewBuilder>>,
    cleaner: Arc<dyn ScratchCleaner>,
    settings: ProcessorSettings,
}

impl IssueProcessor {
    pub fn new(
        locks: LockService,
        dedup: DedupStore,
        artifacts: ArtifactStore,
        cleaner: Arc<dyn ScratchCleaner>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            locks,
            dedup,
            artifacts,
            preview: None,
            cleaner,
            settings,
        }
    }

    pub fn with_preview(mut self, preview: Arc<dyn PreviewBuilder>) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// Processes the current issue of `source`.
    ///
    /// Never returns an error: every failure becomes `IssueOutcome::Failed`.
    /// Scratch cleanup runs exactly once whichever terminal state is reached,
    /// panics in collaborators included.
    pub async fn process(&self, source: &Source) -> IssueOutcome {
        let started = Instant::now();
        let scratch = self
            .settings
            .scratch_root
            .join(&source.id)
            .join(Uuid::new_v4().simple().to_string());
        let stage = Mutex::new(Stage::Resolve);
        let issue = Mutex::new(None::<String>);

        let outcome = match AssertUnwindSafe(self.run(source, &scratch, &stage, &issue))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                let stage = stage.lock().map(|s| *s).unwrap_or(Stage::Acquire);
                let issue = issue.lock().ok().and_then(|i| i.clone());
                IssueOutcome::failed(
                    issue.as_deref(),
                    ProcessError::new(stage, format!("panicked: {}", panic_message(&*panic))),
                )
            }
        };

        if let Err(e) = self.cleaner.cleanup_scratch(&scratch).await {
            warn!(
                "{}: scratch cleanup of {} failed: {}",
                source.id,
                scratch.display(),
                e
            );
        }

        metrics::ISSUE_OUTCOMES
            .with_label_values(&[source.id.as_str(), outcome.label()])
            .inc();
        metrics::ISSUE_DURATION
            .with_label_values(&[source.id.as_str()])
            .observe(started.elapsed().as_secs_f64());

        match &outcome {
            IssueOutcome::Failed { .. } => error!("{}: {}", source.id, outcome),
            IssueOutcome::Completed(CompletionDetail::FanOutDegraded { .. }) => {
                warn!("{}: {}", source.id, outcome)
            }
            _ => info!("{}: {}", source.id, outcome),
        }
        outcome
    }

    async fn run(
        &self,
        source: &Source,
        scratch: &Path,
        stage: &Mutex<Stage>,
        resolved: &Mutex<Option<String>>,
    ) -> IssueOutcome {
        let issue = match source.issue_id().await {
            Ok(issue) => issue,
            Err(e) => return IssueOutcome::failed(None, ProcessError::new(Stage::Resolve, e)),
        };
        if let Ok(mut slot) = resolved.lock() {
            *slot = Some(issue.clone());
        }
        let key = IssueKey::new(source.id.clone(), issue);

        enter(stage, Stage::Lock);
        let locked = self
            .locks
            .scoped(&key, self.settings.lock_ttl, || {
                self.locked(source, &key, scratch, stage)
            })
            .await;

        match locked {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                metrics::LOCK_CONTENTION
                    .with_label_values(&[source.id.as_str()])
                    .inc();
                IssueOutcome::SkippedLocked {
                    issue: key.issue.clone(),
                }
            }
            Err(e) => IssueOutcome::failed(Some(&key.issue), ProcessError::new(Stage::Lock, e)),
        }
    }

    /// Everything that happens while the lock is held.
    async fn locked(
        &self,
        source: &Source,
        key: &IssueKey,
        scratch: &Path,
        stage: &Mutex<Stage>,
    ) -> IssueOutcome {
        let result = match &source.acquisition {
            Acquisition::Single(single) => {
                self.process_single(single.as_ref(), key, scratch, stage)
                    .await
            }
            Acquisition::FanOut(fan_out) => {
                self.process_fan_out(fan_out.as_ref(), key, scratch, stage)
                    .await
            }
        };
        result.unwrap_or_else(|e| IssueOutcome::failed(Some(&key.issue), e))
    }

    async fn process_single(
        &self,
        source: &dyn SingleIssueSource,
        key: &IssueKey,
        scratch: &Path,
        stage: &Mutex<Stage>,
    ) -> Result<IssueOutcome, ProcessError> {
        enter(stage, Stage::Dedup);
        if self
            .dedup
            .lookup(key)
            .await
            .map_err(|e| ProcessError::new(Stage::Dedup, e))?
            .is_some()
        {
            return Ok(IssueOutcome::SkippedDuplicate {
                issue: key.issue.clone(),
            });
        }

        enter(stage, Stage::Acquire);
        tokio::fs::create_dir_all(scratch)
            .await
            .map_err(|e| ProcessError::new(Stage::Acquire, e))?;
        let primary = source
            .download(scratch)
            .await
            .map_err(|e| ProcessError::new(Stage::Acquire, e))?;
        check_primary(&primary).await?;

        enter(stage, Stage::Finalize);
        let preview = self.build_preview(key, &primary, scratch).await;

        enter(stage, Stage::Persist);
        let now = Utc::now();
        let ts = now.timestamp();
        let stem = format!(
            "{}/{}/{}-{}",
            key.source,
            now.format("%Y-%m-%d"),
            key.source,
            ts
        );
        let primary_location = self
            .artifacts
            .save(&primary, &format!("{}.pdf", stem))
            .await
            .map_err(|e| ProcessError::new(Stage::Persist, e))?;
        let preview_location = match preview {
            Some(path) => match self.artifacts.save(&path, &format!("{}.png", stem)).await {
                Ok(location) => Some(location),
                Err(e) => {
                    warn!("{}: storing preview failed: {}", key, e);
                    None
                }
            },
            None => None,
        };

        enter(stage, Stage::Record);
        let payload = DedupPayload::new(
            primary_location.into(),
            preview_location.map(StoredArtifact::from),
            ts,
        )
        .with_metadata("issue", key.issue.clone());
        let record = self
            .dedup
            .record(key, payload, self.settings.retention)
            .await
            .map_err(|e| ProcessError::new(Stage::Record, e))?;

        Ok(IssueOutcome::Completed(CompletionDetail::Single {
            issue: key.issue.clone(),
            payload: record.payload,
        }))
    }

    async fn process_fan_out(
        &self,
        source: &dyn FanOutSource,
        key: &IssueKey,
        scratch: &Path,
        stage: &Mutex<Stage>,
    ) -> Result<IssueOutcome, ProcessError> {
        enter(stage, Stage::Acquire);
        tokio::fs::create_dir_all(scratch)
            .await
            .map_err(|e| ProcessError::new(Stage::Acquire, e))?;

        let ctx = FanOutContext {
            source_id: key.source.clone(),
            dedup: self.dedup.clone(),
            artifacts: self.artifacts.clone(),
            preview: self.preview.clone(),
            retention: self.settings.retention,
        };

        match source.download(scratch, &ctx).await {
            Ok(report) => Ok(IssueOutcome::Completed(CompletionDetail::FanOut {
                issue: key.issue.clone(),
                report,
            })),
            Err(e) if self.settings.fan_out_errors_are_failures => {
                Err(ProcessError::new(Stage::Acquire, e))
            }
            Err(e) => {
                warn!("{}: fan-out acquisition raised, treating as degraded: {}", key, e);
                Ok(IssueOutcome::Completed(CompletionDetail::FanOutDegraded {
                    issue: key.issue.clone(),
                    reason: e.to_string(),
                }))
            }
        }
    }

    async fn build_preview(&self, key: &IssueKey, primary: &Path, scratch: &Path) -> Option<PathBuf> {
        let builder = self.preview.as_ref()?;
        match builder.build_preview(primary, scratch).await {
            Ok(path) => {
                debug!("{}: preview built at {}", key, path.display());
                Some(path)
            }
            Err(e) => {
                warn!("{}: preview failed, continuing without one: {}", key, e);
                metrics::PREVIEW_FAILURES.inc();
                None
            }
        }
    }
}

fn enter(stage: &Mutex<Stage>, next: Stage) {
    if let Ok(mut current) = stage.lock() {
        *current = next;
    }
}

/// The acquired primary must be a non-empty regular file.
async fn check_primary(path: &Path) -> Result<(), ProcessError> {
    let meta = tokio::fs::metadata(path).await.map_err(|e| {
        ProcessError::new(
            Stage::Acquire,
            format!("primary {} is missing: {}", path.display(), e),
        )
    })?;
    if !meta.is_file() {
        return Err(ProcessError::new(
            Stage::Acquire,
            format!("primary {} is not a regular file", path.display()),
        ));
    }
    if meta.len() == 0 {
        return Err(ProcessError::new(
            Stage::Acquire,
            format!("primary {} is empty", path.display()),
        ));
    }
    Ok(())
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_check_primary() {
        let temp = TempDir::new().unwrap();
        let empty = temp.path().join("empty.pdf");
        tokio::fs::write(&empty, b"").await.unwrap();
        let full = temp.path().join("full.pdf");
        tokio::fs::write(&full, b"%PDF").await.unwrap();

        assert!(check_primary(&full).await.is_ok());
        assert_eq!(check_primary(&empty).await.unwrap_err().stage, Stage::Acquire);
        assert!(check_primary(temp.path()).await.is_err());
        assert!(check_primary(&temp.path().join("missing.pdf")).await.is_err());
    }

    #[test]
    fn test_settings_from_config() {
        let config = load_config_from_str(
            r#"
            [paths]
            output_root = "/srv/newsstand"

            [lock]
            ttl_secs = 600

            [runner]
            fan_out_errors_are_failures = true

            [[sources]]
            id = "etemad"
            kind = "http_document"
            url = "https://example.com/{date}.pdf"
            "#,
        )
        .unwrap();

        let settings = ProcessorSettings::from_config(&config);
        assert_eq!(settings.lock_ttl, Duration::from_secs(600));
        assert_eq!(settings.retention, Duration::from_secs(2 * 86_400));
        assert_eq!(settings.scratch_root, PathBuf::from("/srv/newsstand/tmp"));
        assert!(settings.fan_out_errors_are_failures);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*boxed), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*boxed), "bang");
    }
}
