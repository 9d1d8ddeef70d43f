use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, HttpConfig, SourceKind};

use super::{AcquireError, HttpDocumentSource, ManifestSource, Source};

fn http_client(config: &HttpConfig) -> Result<Client, AcquireError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()?)
}

/// Builds the bundled sources listed in `config`, in configuration order.
pub fn build_sources(config: &Config) -> Result<Vec<Source>, AcquireError> {
    let client = http_client(&config.http)?;
    let download_timeout = Duration::from_secs(config.http.download_timeout_secs);

    config
        .sources
        .iter()
        .map(|source| match &source.kind {
            SourceKind::HttpDocument(doc) => {
                let single =
                    HttpDocumentSource::new(&source.id, doc, client.clone(), download_timeout)?;
                Ok(Source::single(&source.id, Arc::new(single)))
            }
            SourceKind::Manifest(manifest) => {
                let fan_out =
                    ManifestSource::new(&source.id, manifest, client.clone(), download_timeout);
                Ok(Source::fan_out(&source.id, Arc::new(fan_out)))
            }
        })
        .collect()
}
