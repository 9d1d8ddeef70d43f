use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactLocation;

/// Both copies of one persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    /// Durable local copy.
    pub local: PathBuf,
    /// `s3://bucket/key` when the upload succeeded.
    #[serde(default)]
    pub remote: Option<String>,
}

impl StoredArtifact {
    /// An artifact that only exists locally.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            local: path.into(),
            remote: None,
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    /// Remote URI when uploaded, local file URI otherwise.
    pub fn uri(&self) -> String {
        match &self.remote {
            Some(remote) => remote.clone(),
            None => format!("file://{}", self.local.display()),
        }
    }
}

impl From<ArtifactLocation> for StoredArtifact {
    fn from(location: ArtifactLocation) -> Self {
        Self {
            local: location.local,
            remote: location.remote,
        }
    }
}

/// What was produced for a completed issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupPayload {
    pub primary: StoredArtifact,
    /// Preview image, if one was built and stored.
    pub preview: Option<StoredArtifact>,
    /// Unix seconds at which the artifacts were produced.
    pub timestamp: i64,
    /// Free-form details; fan-out sources store paper name and date here.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl DedupPayload {
    pub fn new(primary: StoredArtifact, preview: Option<StoredArtifact>, timestamp: i64) -> Self {
        Self {
            primary,
            preview,
            timestamp,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Stored form of a completion record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub payload: DedupPayload,
    /// Unix seconds at which the record was written.
    pub completed_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uploaded_artifact_keeps_local_path() {
        let location = ArtifactLocation {
            local: PathBuf::from("/data/s/2024-01-01/s-1.pdf"),
            remote: Some("s3://b/s/2024-01-01/s-1.pdf".to_string()),
            size_bytes: 4,
            sha256: "00".to_string(),
        };
        let payload = DedupPayload::new(location.into(), None, 1);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["primary"]["local"], "/data/s/2024-01-01/s-1.pdf");
        assert_eq!(json["primary"]["remote"], "s3://b/s/2024-01-01/s-1.pdf");
        assert!(json["preview"].is_null());
    }

    #[test]
    fn test_uri_falls_back_to_local_file() {
        let artifact = StoredArtifact::local("/data/a.png");
        assert_eq!(artifact.uri(), "file:///data/a.png");
        assert_eq!(
            artifact.with_remote("s3://b/a.png").uri(),
            "s3://b/a.png"
        );
    }
}
