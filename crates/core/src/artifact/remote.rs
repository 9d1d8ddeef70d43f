//! Remote object store tier.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::RemoteConfig;

use super::error::RemoteError;

/// Remote object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Makes sure the target bucket exists. A bucket that already exists is
    /// success.
    async fn ensure_bucket(&self) -> Result<(), RemoteError>;

    /// Uploads `local_path` under `key`, overwriting any existing object, and
    /// returns the object URI.
    async fn put(&self, key: &str, local_path: &Path) -> Result<String, RemoteError>;
}

/// S3-compatible store addressed path-style (`{endpoint}/{bucket}/{key}`),
/// e.g. MinIO.
pub struct HttpObjectStore {
    client: Client,
    endpoint: Url,
    bucket: String,
    credentials: Option<(String, String)>,
}

impl HttpObjectStore {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| RemoteError::InvalidConfig("endpoint is not set".to_string()))?;
        let endpoint = Url::parse(endpoint)
            .map_err(|e| RemoteError::InvalidConfig(format!("endpoint {}: {}", endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(RemoteError::InvalidConfig(format!(
                "endpoint {} cannot hold a path",
                endpoint
            )));
        }
        if config.bucket.is_empty() {
            return Err(RemoteError::InvalidConfig("bucket is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let credentials = match (&config.access_key, &config.secret_key) {
            (Some(access), Some(secret)) => Some((access.clone(), secret.clone())),
            _ => None,
        };

        Ok(Self {
            client,
            endpoint,
            bucket: config.bucket.clone(),
            credentials,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn url_for(&self, key: Option<&str>) -> Result<Url, RemoteError> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                RemoteError::InvalidConfig(format!("endpoint {} cannot hold a path", self.endpoint))
            })?;
            segments.pop_if_empty().push(&self.bucket);
            if let Some(key) = key {
                segments.extend(key.split('/').filter(|s| !s.is_empty()));
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some((access, secret)) => request.basic_auth(access, Some(secret)),
            None => request,
        }
    }

    async fn status_error(response: reqwest::Response) -> RemoteError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        RemoteError::Status { status, body }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    fn name(&self) -> &str {
        "s3"
    }

    async fn ensure_bucket(&self) -> Result<(), RemoteError> {
        let url = self.url_for(None)?;

        let head = self.authorize(self.client.head(url.clone())).send().await?;
        if head.status().is_success() {
            debug!("Bucket {} exists", self.bucket);
            return Ok(());
        }

        let response = self.authorize(self.client.put(url)).send().await?;
        match response.status() {
            status if status.is_success() => {
                info!("Created bucket {}", self.bucket);
                Ok(())
            }
            // BucketAlreadyExists / BucketAlreadyOwnedByYou
            StatusCode::CONFLICT => {
                debug!("Bucket {} already exists", self.bucket);
                Ok(())
            }
            _ => Err(Self::status_error(response).await),
        }
    }

    async fn put(&self, key: &str, local_path: &Path) -> Result<String, RemoteError> {
        let url = self.url_for(Some(key))?;
        let body = tokio::fs::read(local_path)
            .await
            .map_err(|source| RemoteError::Read {
                path: local_path.to_path_buf(),
                source,
            })?;
        let size = body.len();

        let response = self
            .authorize(self.client.put(url))
            .header(reqwest::header::CONTENT_TYPE, content_type_for(local_path))
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        debug!("Uploaded {} ({} bytes) to {}/{}", local_path.display(), size, self.bucket, key);
        Ok(format!("s3://{}/{}", self.bucket, key))
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
