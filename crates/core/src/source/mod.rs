//! Issue acquisition.
//!
//! A source either produces one document per invocation
//! ([`SingleIssueSource`]) or walks a listing of many documents and persists
//! each itself ([`FanOutSource`]). Fan-out sources get the capabilities they
//! need through a [`FanOutContext`] instead of reaching for shared state.

mod context;
mod error;
mod factory;
mod http_document;
mod manifest;

pub use context::{FanOutContext, FanOutReport};
pub use error::AcquireError;
pub use factory::build_sources;
pub use http_document::HttpDocumentSource;
pub use manifest::{ManifestEntry, ManifestSource};

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Produces one primary document per issue.
#[async_trait]
pub trait SingleIssueSource: Send + Sync {
    fn name(&self) -> &str;

    /// Stable identifier of the current issue (publication number, date...).
    async fn issue_id(&self) -> Result<String, AcquireError>;

    /// Downloads the current issue into `scratch` and returns the file path.
    async fn download(&self, scratch: &Path) -> Result<PathBuf, AcquireError>;
}

/// Discovers and persists many sub-issues in one invocation.
#[async_trait]
pub trait FanOutSource: Send + Sync {
    fn name(&self) -> &str;

    /// Identifier of the run-level issue used for the outer lock.
    async fn issue_id(&self) -> Result<String, AcquireError>;

    /// Processes every discovered item, skipping those already recorded.
    async fn download(
        &self,
        scratch: &Path,
        ctx: &FanOutContext,
    ) -> Result<FanOutReport, AcquireError>;
}

/// How a source acquires its issues.
#[derive(Clone)]
pub enum Acquisition {
    Single(Arc<dyn SingleIssueSource>),
    FanOut(Arc<dyn FanOutSource>),
}

/// A configured newspaper source.
#[derive(Clone)]
pub struct Source {
    pub id: String,
    pub acquisition: Acquisition,
}

impl Source {
    pub fn single(id: impl Into<String>, source: Arc<dyn SingleIssueSource>) -> Self {
        Self {
            id: id.into(),
            acquisition: Acquisition::Single(source),
        }
    }

    pub fn fan_out(id: impl Into<String>, source: Arc<dyn FanOutSource>) -> Self {
        Self {
            id: id.into(),
            acquisition: Acquisition::FanOut(source),
        }
    }

    pub fn is_fan_out(&self) -> bool {
        matches!(self.acquisition, Acquisition::FanOut(_))
    }

    pub async fn issue_id(&self) -> Result<String, AcquireError> {
        match &self.acquisition {
            Acquisition::Single(source) => source.issue_id().await,
            Acquisition::FanOut(source) => source.issue_id().await,
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("id", &self.id)
            .field("fan_out", &self.is_fan_out())
            .finish()
    }
}

/// Returns true when `bytes` start with the PDF magic number.
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}
