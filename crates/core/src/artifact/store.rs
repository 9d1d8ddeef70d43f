use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::metrics;

use super::error::StorageError;
use super::local::LocalTier;
use super::remote::ObjectStore;
use super::types::ArtifactLocation;

/// Local-first artifact persistence with an optional remote mirror.
#[derive(Clone)]
pub struct ArtifactStore {
    local: LocalTier,
    remote: Option<Arc<dyn ObjectStore>>,
}

impl ArtifactStore {
    /// Store writing only to the local tier rooted at `data_root`.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            local: LocalTier::new(data_root),
            remote: None,
        }
    }

    /// Adds a remote tier.
    pub fn with_remote(mut self, remote: Arc<dyn ObjectStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn data_root(&self) -> &Path {
        self.local.root()
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Persists `local_path` under `remote_key` in both tiers.
    ///
    /// The local copy must succeed; its failure is the only error returned.
    /// The remote upload runs after it and degrades to `remote: None`.
    pub async fn save(
        &self,
        local_path: &Path,
        remote_key: &str,
    ) -> Result<ArtifactLocation, StorageError> {
        let (local, size_bytes, sha256) = self.local.store(local_path, remote_key).await?;

        let remote = match &self.remote {
            Some(remote) => match remote.put(remote_key, &local).await {
                Ok(uri) => {
                    debug!("Uploaded {} to {}", remote_key, uri);
                    Some(uri)
                }
                Err(e) => {
                    warn!(
                        "Upload of {} to {} failed, keeping local copy only: {}",
                        remote_key,
                        remote.name(),
                        e
                    );
                    metrics::REMOTE_UPLOAD_FAILURES.inc();
                    None
                }
            },
            None => None,
        };

        Ok(ArtifactLocation {
            local,
            remote,
            size_bytes,
            sha256,
        })
    }
}
