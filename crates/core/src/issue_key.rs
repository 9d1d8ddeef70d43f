//! The (source, issue) coordination unit.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifies one logical issue of one source.
///
/// The issue part is defined by the source and must stay stable across
/// retries (publication number, date, content hash...). Both the lock and the
/// dedup record are keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueKey {
    pub source: String,
    pub issue: String,
}

impl IssueKey {
    pub fn new(source: impl Into<String>, issue: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            issue: issue.into(),
        }
    }

    /// Store key inside the given keyspace, e.g. `lock:etemad:4521`.
    pub fn namespaced(&self, keyspace: &str) -> String {
        format!("{}:{}:{}", keyspace, self.source, self.issue)
    }

    /// Issue id made safe for use as a single path component.
    pub fn path_component(&self) -> String {
        self.issue
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
                _ => '_',
            })
            .collect()
    }

    /// First 8 hex chars of sha256 over the issue id. Distinguishes artifact
    /// names of issues that share a directory and a timestamp.
    pub fn short_digest(&self) -> String {
        let digest = format!("{:x}", Sha256::digest(self.issue.as_bytes()));
        digest[..8].to_string()
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.issue)
    }
}
