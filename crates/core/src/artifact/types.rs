use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where a persisted artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    /// Durable local copy (always present).
    pub local: PathBuf,
    /// `s3://bucket/key` when the upload succeeded.
    pub remote: Option<String>,
    /// Size of the local copy.
    pub size_bytes: u64,
    /// SHA-256 of the local copy, hex encoded.
    pub sha256: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_remote_serializes_as_null() {
        let location = ArtifactLocation {
            local: PathBuf::from("/data/a.png"),
            remote: None,
            size_bytes: 1,
            sha256: "00".to_string(),
        };
        let json = serde_json::to_value(&location).unwrap();
        assert!(json["remote"].is_null());
    }
}
