use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ManifestConfig;
use crate::issue_key::IssueKey;
use crate::metrics;

use super::{is_pdf, AcquireError, FanOutContext, FanOutReport, FanOutSource};

/// One document listed by a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Newspaper name.
    pub paper: String,
    /// Publication date as printed by the publisher.
    pub date: String,
    /// Document URL.
    pub url: String,
}

impl ManifestEntry {
    /// Sub-issue id: `{paper}:{date}:{first 8 hex of sha256(url)}`.
    pub fn issue_id(&self) -> String {
        let digest = format!("{:x}", Sha256::digest(self.url.as_bytes()));
        format!("{}:{}:{}", self.paper, self.date, &digest[..8])
    }
}

/// Fan-out source driven by a JSON manifest listing many papers.
pub struct ManifestSource {
    id: String,
    manifest_url: String,
    client: Client,
    download_timeout: Duration,
    date: Option<NaiveDate>,
}

impl ManifestSource {
    pub fn new(
        id: impl Into<String>,
        config: &ManifestConfig,
        client: Client,
        download_timeout: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            manifest_url: config.manifest_url.clone(),
            client,
            download_timeout,
            date: None,
        }
    }

    /// Pins the run date instead of using today's (UTC).
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    fn date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Utc::now().date_naive())
    }

    async fn fetch_manifest(&self) -> Result<Vec<ManifestEntry>, AcquireError> {
        let response = self.client.get(&self.manifest_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AcquireError::Status {
                url: self.manifest_url.clone(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| AcquireError::Manifest(e.to_string()))
    }

    async fn process_entry(
        &self,
        entry: &ManifestEntry,
        key: &IssueKey,
        scratch: &Path,
        ctx: &FanOutContext,
    ) -> Result<(), AcquireError> {
        let response = self
            .client
            .get(&entry.url)
            .timeout(self.download_timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AcquireError::Status {
                url: entry.url.clone(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        if !is_pdf(&bytes) {
            return Err(AcquireError::InvalidDocument {
                url: entry.url.clone(),
                reason: "body is not a PDF".to_string(),
            });
        }

        let paper = path_safe(&entry.paper);
        let item_dir = scratch.join(&paper);
        tokio::fs::create_dir_all(&item_dir).await?;
        let pdf = item_dir.join(format!("{}.pdf", path_safe(&key.issue)));
        tokio::fs::write(&pdf, &bytes).await?;

        let mut metadata = BTreeMap::new();
        metadata.insert("paper".to_string(), entry.paper.clone());
        metadata.insert("date".to_string(), entry.date.clone());
        metadata.insert("url".to_string(), entry.url.clone());

        let dir_key = format!("{}/{}/{}", self.id, paper, self.date().format("%Y-%m-%d"));
        ctx.store_item(key, &pdf, &dir_key, metadata).await?;
        Ok(())
    }
}

#[async_trait]
impl FanOutSource for ManifestSource {
    fn name(&self) -> &str {
        &self.id
    }

    async fn issue_id(&self) -> Result<String, AcquireError> {
        Ok(format!("{}-{}", self.id, self.date().format("%Y%m%d")))
    }

    async fn download(
        &self,
        scratch: &Path,
        ctx: &FanOutContext,
    ) -> Result<FanOutReport, AcquireError> {
        let entries = self.fetch_manifest().await?;
        info!("{}: manifest lists {} documents", self.id, entries.len());

        let mut report = FanOutReport::default();
        for entry in &entries {
            let key = ctx.sub_issue(entry.issue_id());

            match ctx.dedup.is_recorded(&key).await {
                Ok(true) => {
                    debug!("{}: already recorded, skipping", key);
                    report.already_recorded += 1;
                    metrics::FAN_OUT_ITEMS
                        .with_label_values(&[self.id.as_str(), "already_recorded"])
                        .inc();
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("{}: dedup lookup failed: {}", key, e);
                    report.failed_items += 1;
                    metrics::FAN_OUT_ITEMS
                        .with_label_values(&[self.id.as_str(), "failed"])
                        .inc();
                    continue;
                }
            }

            match self.process_entry(entry, &key, scratch, ctx).await {
                Ok(()) => {
                    info!("{}: stored {}", self.id, key);
                    report.new_issues += 1;
                    metrics::FAN_OUT_ITEMS.with_label_values(&[self.id.as_str(), "new"]).inc();
                }
                Err(e) => {
                    warn!("{}: {} failed: {}", self.id, key, e);
                    report.failed_items += 1;
                    metrics::FAN_OUT_ITEMS
                        .with_label_values(&[self.id.as_str(), "failed"])
                        .inc();
                }
            }
        }

        Ok(report)
    }
}

fn path_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactStore;
    use crate::dedup::{DedupPayload, DedupStore, StoredArtifact};
    use crate::store::MemoryStore;
    use std::sync::Arc;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(server: &MockServer, paper: &str) -> ManifestEntry {
        ManifestEntry {
            paper: paper.to_string(),
            date: "1403-01-01".to_string(),
            url: format!("{}/files/{}.pdf", server.uri(), paper),
        }
    }

    fn context(temp: &TempDir) -> FanOutContext {
        FanOutContext {
            source_id: "pishkhan".to_string(),
            dedup: DedupStore::new(Arc::new(MemoryStore::new())),
            artifacts: ArtifactStore::new(temp.path().join("data")),
            preview: None,
            retention: Duration::from_secs(2 * 86_400),
        }
    }

    fn source(server: &MockServer) -> ManifestSource {
        let config = ManifestConfig {
            manifest_url: format!("{}/manifest.json", server.uri()),
        };
        ManifestSource::new("pishkhan", &config, Client::new(), Duration::from_secs(5))
            .with_date(NaiveDate::from_ymd_opt(2024, 3, 20).unwrap())
    }

    async fn serve_manifest(server: &MockServer, entries: &[ManifestEntry]) {
        Mock::given(method("GET"))
            .and(path("/manifest.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(entries))
            .mount(server)
            .await;
    }

    async fn serve_pdf(server: &MockServer, paper: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/files/{}.pdf", paper)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(server)
            .await;
    }

    #[test]
    fn test_entry_issue_id() {
        let entry = ManifestEntry {
            paper: "iran".to_string(),
            date: "1403-01-01".to_string(),
            url: "https://example.com/iran.pdf".to_string(),
        };
        let id = entry.issue_id();
        assert!(id.starts_with("iran:1403-01-01:"));
        assert_eq!(id.len(), "iran:1403-01-01:".len() + 8);
        assert_eq!(id, entry.clone().issue_id());
    }

    #[tokio::test]
    async fn test_issue_id_is_dated() {
        let server = MockServer::start().await;
        assert_eq!(source(&server).issue_id().await.unwrap(), "pishkhan-20240320");
    }

    #[tokio::test]
    async fn test_download_records_new_and_skips_recorded() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let iran = entry(&server, "iran");
        let etemad = entry(&server, "etemad");
        serve_manifest(&server, &[iran.clone(), etemad.clone()]).await;
        serve_pdf(&server, "etemad").await;

        ctx.dedup
            .record(
                &ctx.sub_issue(iran.issue_id()),
                DedupPayload::new(StoredArtifact::local("/old.pdf"), None, 1),
                ctx.retention,
            )
            .await
            .unwrap();

        let report = source(&server)
            .download(&temp.path().join("scratch"), &ctx)
            .await
            .unwrap();

        assert_eq!(
            report,
            FanOutReport {
                new_issues: 1,
                already_recorded: 1,
                failed_items: 0,
            }
        );
        let record = ctx
            .dedup
            .lookup(&ctx.sub_issue(etemad.issue_id()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.payload.metadata["paper"], "etemad");
        assert!(record
            .payload
            .primary
            .local
            .to_string_lossy()
            .contains("data/pishkhan/etemad/2024-03-20/pishkhan-"));
    }

    #[tokio::test]
    async fn test_failed_item_does_not_stop_loop() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let broken = entry(&server, "broken");
        let good = entry(&server, "good");
        serve_manifest(&server, &[broken.clone(), good.clone()]).await;
        Mock::given(method("GET"))
            .and(path("/files/broken.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;
        serve_pdf(&server, "good").await;

        let report = source(&server)
            .download(&temp.path().join("scratch"), &ctx)
            .await
            .unwrap();

        assert_eq!(report.new_issues, 1);
        assert_eq!(report.failed_items, 1);
        assert!(!ctx.dedup.is_recorded(&ctx.sub_issue(broken.issue_id())).await.unwrap());
        assert!(ctx.dedup.is_recorded(&ctx.sub_issue(good.issue_id())).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_paper_and_date_at_two_urls_keeps_both_documents() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let first = ManifestEntry {
            paper: "iran".to_string(),
            date: "1403-01-01".to_string(),
            url: format!("{}/a.pdf", server.uri()),
        };
        let second = ManifestEntry {
            url: format!("{}/b.pdf", server.uri()),
            ..first.clone()
        };
        serve_manifest(&server, &[first.clone(), second.clone()]).await;
        for (route, body) in [("/a.pdf", b"%PDF-AAAA"), ("/b.pdf", b"%PDF-BBBB")] {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
                .mount(&server)
                .await;
        }

        let report = source(&server)
            .download(&temp.path().join("scratch"), &ctx)
            .await
            .unwrap();
        assert_eq!(report.new_issues, 2);

        let mut stored = Vec::new();
        for entry in [&first, &second] {
            let record = ctx
                .dedup
                .lookup(&ctx.sub_issue(entry.issue_id()))
                .await
                .unwrap()
                .unwrap();
            stored.push(record.payload.primary.local);
        }
        assert_ne!(stored[0], stored[1]);
        assert_eq!(tokio::fs::read(&stored[0]).await.unwrap(), b"%PDF-AAAA");
        assert_eq!(tokio::fs::read(&stored[1]).await.unwrap(), b"%PDF-BBBB");
    }

    #[tokio::test]
    async fn test_empty_manifest_is_success() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();
        serve_manifest(&server, &[]).await;

        let report = source(&server)
            .download(temp.path(), &context(&temp))
            .await
            .unwrap();
        assert_eq!(report, FanOutReport::default());
    }

    #[tokio::test]
    async fn test_bad_manifest_raises() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{ not a list"))
            .mount(&server)
            .await;

        let result = source(&server).download(temp.path(), &context(&temp)).await;
        assert!(matches!(result, Err(AcquireError::Manifest(_))));
    }
}
