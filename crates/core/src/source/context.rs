use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::artifact::ArtifactStore;
use crate::dedup::{DedupPayload, DedupRecord, DedupStore, StoredArtifact};
use crate::issue_key::IssueKey;
use crate::metrics;
use crate::preview::PreviewBuilder;

use super::AcquireError;

/// What a fan-out source may touch while it runs.
#[derive(Clone)]
pub struct FanOutContext {
    pub source_id: String,
    pub dedup: DedupStore,
    pub artifacts: ArtifactStore,
    pub preview: Option<Arc<dyn PreviewBuilder>>,
    pub retention: Duration,
}

impl FanOutContext {
    /// Key of a sub-issue of this source.
    pub fn sub_issue(&self, issue: impl Into<String>) -> IssueKey {
        IssueKey::new(self.source_id.clone(), issue)
    }

    /// Persists one downloaded item and records it as done.
    ///
    /// The primary goes to `{dir_key}/{source}-{ts}-{digest}.pdf`, where the
    /// digest comes from the sub-issue id, and the preview, when it could be
    /// built, next to it as `.png`. Preview problems only drop the
    /// preview; primary storage and recording failures are returned.
    pub async fn store_item(
        &self,
        key: &IssueKey,
        primary: &Path,
        dir_key: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<DedupRecord, AcquireError> {
        let ts = Utc::now().timestamp();

        let preview_path = match &self.preview {
            Some(builder) => {
                let output_dir = primary.parent().unwrap_or_else(|| Path::new("."));
                match builder.build_preview(primary, output_dir).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!("Preview for {} failed: {}", key, e);
                        metrics::PREVIEW_FAILURES.inc();
                        None
                    }
                }
            }
            None => None,
        };

        let stem = format!(
            "{}/{}-{}-{}",
            dir_key,
            self.source_id,
            ts,
            key.short_digest()
        );
        let primary_location = self
            .artifacts
            .save(primary, &format!("{}.pdf", stem))
            .await?;

        let preview_location = match preview_path {
            Some(path) => match self.artifacts.save(&path, &format!("{}.png", stem)).await {
                Ok(location) => Some(location),
                Err(e) => {
                    warn!("Storing preview for {} failed: {}", key, e);
                    None
                }
            },
            None => None,
        };

        let mut payload = DedupPayload::new(
            primary_location.into(),
            preview_location.map(StoredArtifact::from),
            ts,
        );
        payload.metadata = metadata;

        Ok(self.dedup.record(key, payload, self.retention).await?)
    }
}

/// Item counts of one fan-out invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanOutReport {
    pub new_issues: u32,
    pub already_recorded: u32,
    pub failed_items: u32,
}

impl FanOutReport {
    pub fn total(&self) -> u32 {
        self.new_issues + self.already_recorded + self.failed_items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::MockPreviewBuilder;
    use tempfile::TempDir;

    fn context(temp: &TempDir, preview: Option<Arc<dyn PreviewBuilder>>) -> FanOutContext {
        FanOutContext {
            source_id: "pishkhan".to_string(),
            dedup: DedupStore::new(Arc::new(MemoryStore::new())),
            artifacts: ArtifactStore::new(temp.path().join("data")),
            preview,
            retention: Duration::from_secs(2 * 86_400),
        }
    }

    #[tokio::test]
    async fn test_store_item_records_primary_and_preview() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, Some(Arc::new(MockPreviewBuilder::new())));
        let pdf = temp.path().join("iran.pdf");
        tokio::fs::write(&pdf, b"%PDF").await.unwrap();

        let key = ctx.sub_issue("iran:1403-01-01:abcd1234");
        let mut metadata = BTreeMap::new();
        metadata.insert("paper".to_string(), "iran".to_string());

        let record = ctx
            .store_item(&key, &pdf, "pishkhan/iran/2024-03-20", metadata)
            .await
            .unwrap();

        let primary = &record.payload.primary;
        assert!(primary.remote.is_none());
        assert!(primary.local.exists());
        let local = primary.local.to_string_lossy();
        assert!(local.contains("pishkhan/iran/2024-03-20/pishkhan-"));
        assert!(local.ends_with(&format!("-{}.pdf", key.short_digest())));
        let preview = record.payload.preview.as_ref().unwrap();
        assert!(preview.local.to_string_lossy().ends_with(".png"));
        assert_eq!(record.payload.metadata["paper"], "iran");
        assert!(ctx.dedup.is_recorded(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_store_item_preview_failure_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let builder = Arc::new(MockPreviewBuilder::new());
        builder.set_fail(true).await;
        let ctx = context(&temp, Some(builder));
        let pdf = temp.path().join("iran.pdf");
        tokio::fs::write(&pdf, b"%PDF").await.unwrap();

        let key = ctx.sub_issue("x");
        let record = ctx
            .store_item(&key, &pdf, "pishkhan/iran/2024-03-20", BTreeMap::new())
            .await
            .unwrap();

        assert!(record.payload.preview.is_none());
    }

    #[tokio::test]
    async fn test_items_sharing_a_directory_keep_separate_files() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, None);
        let first = temp.path().join("first.pdf");
        let second = temp.path().join("second.pdf");
        tokio::fs::write(&first, b"%PDF-AAAA").await.unwrap();
        tokio::fs::write(&second, b"%PDF-BBBB").await.unwrap();

        let dir_key = "pishkhan/iran/2024-03-20";
        let a = ctx
            .store_item(
                &ctx.sub_issue("iran:1403-01-01:aaaa0000"),
                &first,
                dir_key,
                BTreeMap::new(),
            )
            .await
            .unwrap();
        let b = ctx
            .store_item(
                &ctx.sub_issue("iran:1403-01-01:bbbb1111"),
                &second,
                dir_key,
                BTreeMap::new(),
            )
            .await
            .unwrap();

        assert_ne!(a.payload.primary.local, b.payload.primary.local);
        assert_eq!(
            tokio::fs::read(&a.payload.primary.local).await.unwrap(),
            b"%PDF-AAAA"
        );
        assert_eq!(
            tokio::fs::read(&b.payload.primary.local).await.unwrap(),
            b"%PDF-BBBB"
        );
    }

    #[test]
    fn test_report_total() {
        let report = FanOutReport {
            new_issues: 2,
            already_recorded: 3,
            failed_items: 1,
        };
        assert_eq!(report.total(), 6);
    }
}
