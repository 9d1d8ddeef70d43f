//! Wiring of one run from configuration.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use newsstand_core::artifact::{HttpObjectStore, ObjectStore};
use newsstand_core::metrics::encode_metrics;
use newsstand_core::{
    build_sources, connect_store, ArtifactStore, CommandPreviewBuilder, Config, DedupStore,
    IssueProcessor, KeyValueStore, LockService, ProcessorSettings, RunCoordinator,
    ScratchDirCleaner, Source,
};

pub struct App {
    pub coordinator: RunCoordinator,
    pub sources: Vec<Source>,
}

impl App {
    pub async fn build(config: &Config) -> Result<Self> {
        let store = connect_store(&config.store)
            .await
            .context("Failed to connect to the key-value store")?;
        info!("Key-value store: {}", store.name());

        let mut artifacts = ArtifactStore::new(config.paths.data_root());
        if let Some(remote) = connect_remote(config).await {
            artifacts = artifacts.with_remote(remote);
        }

        let settings = ProcessorSettings::from_config(config);
        tokio::fs::create_dir_all(&settings.scratch_root)
            .await
            .with_context(|| format!("Failed to create {:?}", settings.scratch_root))?;

        let mut processor = IssueProcessor::new(
            LockService::new(store.clone()),
            DedupStore::new(store),
            artifacts,
            Arc::new(ScratchDirCleaner::new()),
            settings,
        );
        if config.preview.enabled {
            processor = processor.with_preview(Arc::new(CommandPreviewBuilder::new(&config.preview)));
        }

        let sources = build_sources(config).context("Failed to build sources")?;
        info!("Configured {} sources", sources.len());

        Ok(Self {
            coordinator: RunCoordinator::new(processor),
            sources,
        })
    }
}

/// Remote tier, or `None` when disabled or unreachable at startup.
async fn connect_remote(config: &Config) -> Option<Arc<dyn ObjectStore>> {
    if !config.remote.enabled {
        info!("Remote storage disabled, keeping local copies only");
        return None;
    }

    let remote = match HttpObjectStore::new(&config.remote) {
        Ok(remote) => remote,
        Err(e) => {
            warn!("Remote storage unusable, keeping local copies only: {}", e);
            return None;
        }
    };
    match remote.ensure_bucket().await {
        Ok(()) => {
            info!("Remote storage ready (bucket {})", remote.bucket());
            Some(Arc::new(remote))
        }
        Err(e) => {
            warn!("Remote storage unavailable, keeping local copies only: {}", e);
            None
        }
    }
}

/// Writes the metrics exposition atomically for the node-exporter textfile
/// collector.
pub async fn write_metrics_textfile(path: &Path) -> Result<()> {
    let text = encode_metrics().context("Failed to encode metrics")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("prom.tmp");
    tokio::fs::write(&tmp, text).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
