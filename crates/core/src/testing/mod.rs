//! Testing utilities and mock implementations.
//!
//! Controllable stand-ins for every collaborator of the issue processor, so
//! lifecycles can be exercised without network access or external programs.
//!
//! # Example
//!
//! ```rust,ignore
//! use newsstand_core::testing::{MockCleaner, MockSingleSource};
//!
//! let source = Arc::new(MockSingleSource::new("etemad", "4521"));
//! source.set_fail_download(true).await;
//!
//! let cleaner = Arc::new(MockCleaner::new());
//! // ... run the processor ...
//! assert_eq!(cleaner.call_count().await, 1);
//! ```

mod mock_cleaner;
mod mock_object_store;
mod mock_preview;
mod mock_source;
mod mock_store;

pub use mock_cleaner::MockCleaner;
pub use mock_object_store::{MockObjectStore, RecordedUpload};
pub use mock_preview::MockPreviewBuilder;
pub use mock_source::{MockFanOutSource, MockSingleSource};
pub use mock_store::MockStore;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    /// Minimal bytes that pass the PDF magic check.
    pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n%mock\n";

    /// Writes a small PDF-looking file and returns its path.
    pub async fn write_pdf(dir: &Path, name: &str) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(name);
        tokio::fs::write(&path, PDF_BYTES).await?;
        Ok(path)
    }
}
