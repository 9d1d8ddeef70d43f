use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use regex_lite::Regex;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::HttpDocumentConfig;

use super::{is_pdf, AcquireError, SingleIssueSource};

/// Fetches one PDF per day from a dated URL.
///
/// The issue id is the date (`YYYYMMDD`), or the publication number scraped
/// from `issue_url` with `issue_pattern` when both are configured.
pub struct HttpDocumentSource {
    id: String,
    url_template: String,
    issue_lookup: Option<(String, Regex)>,
    client: Client,
    download_timeout: Duration,
    date: Option<NaiveDate>,
}

impl HttpDocumentSource {
    pub fn new(
        id: impl Into<String>,
        config: &HttpDocumentConfig,
        client: Client,
        download_timeout: Duration,
    ) -> Result<Self, AcquireError> {
        let issue_lookup = match (&config.issue_url, &config.issue_pattern) {
            (Some(url), Some(pattern)) => {
                let regex = Regex::new(pattern)
                    .map_err(|e| AcquireError::Config(format!("issue_pattern: {}", e)))?;
                Some((url.clone(), regex))
            }
            (None, None) => None,
            _ => {
                return Err(AcquireError::Config(
                    "issue_url and issue_pattern must be set together".to_string(),
                ))
            }
        };

        Ok(Self {
            id: id.into(),
            url_template: config.url.clone(),
            issue_lookup,
            client,
            download_timeout,
            date: None,
        })
    }

    /// Pins the publication date instead of using today's (UTC).
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    fn date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Substitutes `{date}` and `{iso_date}` in a URL template.
    pub fn render(&self, template: &str) -> String {
        let date = self.date();
        template
            .replace("{date}", &date.format("%Y%m%d").to_string())
            .replace("{iso_date}", &date.format("%Y-%m-%d").to_string())
    }

    async fn scrape_issue_number(&self, url: &str, pattern: &Regex) -> Result<String, AcquireError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AcquireError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;

        let captures = pattern
            .captures(&body)
            .ok_or_else(|| AcquireError::IssueNotFound(format!("no match at {}", url)))?;
        let issue = captures
            .get(1)
            .or_else(|| captures.get(0))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AcquireError::IssueNotFound(format!("empty match at {}", url)))?;

        debug!("{}: publication number {}", self.id, issue);
        Ok(issue)
    }
}

#[async_trait]
impl SingleIssueSource for HttpDocumentSource {
    fn name(&self) -> &str {
        &self.id
    }

    async fn issue_id(&self) -> Result<String, AcquireError> {
        match &self.issue_lookup {
            Some((url, pattern)) => {
                let url = self.render(url);
                self.scrape_issue_number(&url, pattern).await
            }
            None => Ok(self.date().format("%Y%m%d").to_string()),
        }
    }

    async fn download(&self, scratch: &Path) -> Result<PathBuf, AcquireError> {
        let url = self.render(&self.url_template);
        info!("{}: downloading {}", self.id, url);

        let response = self
            .client
            .get(&url)
            .timeout(self.download_timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AcquireError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        if !is_pdf(&bytes) {
            return Err(AcquireError::InvalidDocument {
                url,
                reason: "body is not a PDF".to_string(),
            });
        }

        tokio::fs::create_dir_all(scratch).await?;
        let path = scratch.join(format!("{}.pdf", self.id));
        tokio::fs::write(&path, &bytes).await?;

        debug!("{}: saved {} bytes to {}", self.id, bytes.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer, issue: bool) -> HttpDocumentSource {
        let config = HttpDocumentConfig {
            url: format!("{}/pdf/{{date}}/front.pdf", server.uri()),
            issue_url: issue.then(|| format!("{}/today/{{iso_date}}", server.uri())),
            issue_pattern: issue.then(|| r"Issue No\.\s*(\d+)".to_string()),
        };
        HttpDocumentSource::new("etemad", &config, Client::new(), Duration::from_secs(5))
            .unwrap()
            .with_date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
    }

    #[tokio::test]
    async fn test_issue_id_defaults_to_date() {
        let server = MockServer::start().await;
        assert_eq!(source(&server, false).issue_id().await.unwrap(), "20240102");
    }

    #[tokio::test]
    async fn test_issue_id_from_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/today/2024-01-02"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<b>Issue No. 4521</b>"))
            .mount(&server)
            .await;

        assert_eq!(source(&server, true).issue_id().await.unwrap(), "4521");
    }

    #[tokio::test]
    async fn test_issue_id_missing_on_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>maintenance</p>"))
            .mount(&server)
            .await;

        let result = source(&server, true).issue_id().await;
        assert!(matches!(result, Err(AcquireError::IssueNotFound(_))));
    }

    #[tokio::test]
    async fn test_download_writes_pdf() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdf/20240102/front.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.5 data".to_vec()))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let scratch = temp.path().join("scratch");
        let pdf = source(&server, false).download(&scratch).await.unwrap();

        assert_eq!(pdf, scratch.join("etemad.pdf"));
        assert_eq!(tokio::fs::read(&pdf).await.unwrap(), b"%PDF-1.5 data");
    }

    #[tokio::test]
    async fn test_download_rejects_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not yet</html>"))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let result = source(&server, false).download(temp.path()).await;
        assert!(matches!(result, Err(AcquireError::InvalidDocument { .. })));
    }

    #[tokio::test]
    async fn test_download_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let result = source(&server, false).download(temp.path()).await;
        assert!(matches!(result, Err(AcquireError::Status { status: 404, .. })));
    }

    #[test]
    fn test_half_configured_issue_lookup_is_rejected() {
        let config = HttpDocumentConfig {
            url: "http://example.invalid/{date}.pdf".to_string(),
            issue_url: Some("http://example.invalid/".to_string()),
            issue_pattern: None,
        };
        let result = HttpDocumentSource::new("x", &config, Client::new(), Duration::from_secs(1));
        assert!(matches!(result, Err(AcquireError::Config(_))));
    }
}
