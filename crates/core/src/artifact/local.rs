//! Durable local tier.

use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::debug;
use uuid::Uuid;

use super::error::StorageError;

/// Buffer size for file copies.
const COPY_BUFFER_SIZE: usize = 1024 * 1024;

/// Local directory tree holding the durable copy of every artifact.
#[derive(Debug, Clone)]
pub struct LocalTier {
    root: PathBuf,
}

impl LocalTier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `key` below the root, rejecting keys that would escape it.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Copies `source` to the location for `key` and returns the final path,
    /// its size and SHA-256.
    ///
    /// The copy is written next to the destination under a temporary name and
    /// renamed into place, so a half-written file never carries the final
    /// name. An existing file at the destination is replaced. When `source`
    /// already is the destination nothing is copied.
    pub async fn store(
        &self,
        source: &Path,
        key: &str,
    ) -> Result<(PathBuf, u64, String), StorageError> {
        let destination = self.path_for(key)?;

        if !source.exists() {
            return Err(StorageError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }

        if Self::same_file(source, &destination).await {
            debug!("Artifact already in place: {}", destination.display());
            let (size, checksum) = Self::checksum(&destination).await?;
            return Ok((destination, size, checksum));
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let partial = destination.with_file_name(format!(
            ".{}.partial-{}",
            destination
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "artifact".to_string()),
            Uuid::new_v4().simple()
        ));

        let copied = Self::copy_file(source, &partial).await;
        let (size, checksum) = match copied {
            Ok(result) => result,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        if let Err(error) = fs::rename(&partial, &destination).await {
            let _ = fs::remove_file(&partial).await;
            return Err(StorageError::MoveFailed {
                source: partial,
                destination,
                error,
            });
        }

        debug!(
            "Stored {} -> {} ({} bytes)",
            source.display(),
            destination.display(),
            size
        );
        Ok((destination, size, checksum))
    }

    async fn same_file(a: &Path, b: &Path) -> bool {
        match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    /// Copies a file while hashing it.
    async fn copy_file(source: &Path, destination: &Path) -> Result<(u64, String), StorageError> {
        let source_file = File::open(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::SourceNotFound {
                    path: source.to_path_buf(),
                }
            } else {
                StorageError::Io(e)
            }
        })?;

        let dest_file = File::create(destination).await.map_err(|e| {
            StorageError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
        })?;

        let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, source_file);
        let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, dest_file);
        let mut hasher = Sha256::new();
        let mut total_bytes = 0u64;
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];

        loop {
            let bytes_read = reader.read(&mut buffer).await.map_err(|e| {
                StorageError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
            })?;

            if bytes_read == 0 {
                break;
            }

            hasher.update(&buffer[..bytes_read]);
            writer.write_all(&buffer[..bytes_read]).await.map_err(|e| {
                StorageError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
            })?;

            total_bytes += bytes_read as u64;
        }

        writer.flush().await.map_err(|e| {
            StorageError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
        })?;
        writer.get_ref().sync_all().await.map_err(|e| {
            StorageError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
        })?;

        Ok((total_bytes, format!("{:x}", hasher.finalize())))
    }

    async fn checksum(path: &Path) -> Result<(u64, String), StorageError> {
        let file = File::open(path).await?;
        let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, file);
        let mut hasher = Sha256::new();
        let mut total_bytes = 0u64;
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];

        loop {
            let bytes_read = reader.read(&mut buffer).await?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
            total_bytes += bytes_read as u64;
        }

        Ok((total_bytes, format!("{:x}", hasher.finalize())))
    }
}
