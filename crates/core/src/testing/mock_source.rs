//! Mock sources for testing.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::source::{AcquireError, FanOutContext, FanOutReport, FanOutSource, SingleIssueSource};

use super::fixtures::{write_pdf, PDF_BYTES};

/// Mock implementation of the SingleIssueSource trait.
///
/// Writes a configurable document into the scratch directory and counts how
/// often it was asked to.
#[derive(Debug)]
pub struct MockSingleSource {
    name: String,
    issue: Arc<RwLock<String>>,
    document: Arc<RwLock<Vec<u8>>>,
    fail_resolve: Arc<RwLock<bool>>,
    fail_download: Arc<RwLock<bool>>,
    panic_on_download: Arc<RwLock<bool>>,
    download_delay: Arc<RwLock<Option<Duration>>>,
    downloads: Arc<RwLock<Vec<PathBuf>>>,
}

impl MockSingleSource {
    pub fn new(name: impl Into<String>, issue: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            issue: Arc::new(RwLock::new(issue.into())),
            document: Arc::new(RwLock::new(PDF_BYTES.to_vec())),
            fail_resolve: Arc::new(RwLock::new(false)),
            fail_download: Arc::new(RwLock::new(false)),
            panic_on_download: Arc::new(RwLock::new(false)),
            download_delay: Arc::new(RwLock::new(None)),
            downloads: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set_issue(&self, issue: impl Into<String>) {
        *self.issue.write().await = issue.into();
    }

    /// Bytes written as the downloaded document.
    pub async fn set_document(&self, bytes: impl Into<Vec<u8>>) {
        *self.document.write().await = bytes.into();
    }

    pub async fn set_fail_resolve(&self, fail: bool) {
        *self.fail_resolve.write().await = fail;
    }

    pub async fn set_fail_download(&self, fail: bool) {
        *self.fail_download.write().await = fail;
    }

    pub async fn set_panic_on_download(&self, panic: bool) {
        *self.panic_on_download.write().await = panic;
    }

    /// Sleep this long inside `download`, keeping the lock held.
    pub async fn set_download_delay(&self, delay: Duration) {
        *self.download_delay.write().await = Some(delay);
    }

    /// Scratch directories `download` was called with.
    pub async fn downloads(&self) -> Vec<PathBuf> {
        self.downloads.read().await.clone()
    }

    pub async fn download_count(&self) -> usize {
        self.downloads.read().await.len()
    }
}

#[async_trait]
impl SingleIssueSource for MockSingleSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn issue_id(&self) -> Result<String, AcquireError> {
        if *self.fail_resolve.read().await {
            return Err(AcquireError::IssueNotFound("mock resolve failure".to_string()));
        }
        Ok(self.issue.read().await.clone())
    }

    async fn download(&self, scratch: &Path) -> Result<PathBuf, AcquireError> {
        self.downloads.write().await.push(scratch.to_path_buf());

        let delay = *self.download_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.panic_on_download.read().await {
            panic!("mock source panicked");
        }
        if *self.fail_download.read().await {
            return Err(AcquireError::Other("mock download failure".to_string()));
        }

        let path = scratch.join(format!("{}.pdf", self.name));
        tokio::fs::write(&path, &*self.document.read().await).await?;
        Ok(path)
    }
}

/// Mock implementation of the FanOutSource trait.
///
/// Each configured item id is treated as a sub-issue: skipped when already
/// recorded, otherwise stored through the context.
#[derive(Debug)]
pub struct MockFanOutSource {
    name: String,
    issue: String,
    items: Arc<RwLock<Vec<String>>>,
    failing_items: Arc<RwLock<Vec<String>>>,
    error: Arc<RwLock<Option<String>>>,
    download_count: Arc<RwLock<usize>>,
}

impl MockFanOutSource {
    pub fn new(name: impl Into<String>, issue: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            issue: issue.into(),
            items: Arc::new(RwLock::new(Vec::new())),
            failing_items: Arc::new(RwLock::new(Vec::new())),
            error: Arc::new(RwLock::new(None)),
            download_count: Arc::new(RwLock::new(0)),
        }
    }

    pub async fn set_items(&self, items: Vec<String>) {
        *self.items.write().await = items;
    }

    /// Items that fail individually.
    pub async fn set_failing_items(&self, items: Vec<String>) {
        *self.failing_items.write().await = items;
    }

    /// Make the whole invocation raise with this message.
    pub async fn set_error(&self, message: impl Into<String>) {
        *self.error.write().await = Some(message.into());
    }

    pub async fn download_count(&self) -> usize {
        *self.download_count.read().await
    }
}

#[async_trait]
impl FanOutSource for MockFanOutSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn issue_id(&self) -> Result<String, AcquireError> {
        Ok(self.issue.clone())
    }

    async fn download(
        &self,
        scratch: &Path,
        ctx: &FanOutContext,
    ) -> Result<FanOutReport, AcquireError> {
        *self.download_count.write().await += 1;

        if let Some(message) = self.error.read().await.clone() {
            return Err(AcquireError::Other(message));
        }

        let failing = self.failing_items.read().await.clone();
        let mut report = FanOutReport::default();
        for item in self.items.read().await.iter() {
            let key = ctx.sub_issue(item.clone());
            if ctx.dedup.is_recorded(&key).await? {
                report.already_recorded += 1;
                continue;
            }
            if failing.contains(item) {
                report.failed_items += 1;
                continue;
            }

            let pdf = write_pdf(scratch, &format!("{}.pdf", key.path_component())).await?;
            let mut metadata = BTreeMap::new();
            metadata.insert("paper".to_string(), item.clone());
            ctx.store_item(
                &key,
                &pdf,
                &format!("{}/{}/2024-01-01", self.name, key.path_component()),
                metadata,
            )
            .await?;
            report.new_issues += 1;
        }
        Ok(report)
    }
}
