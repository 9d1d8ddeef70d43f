pub mod artifact;
pub mod config;
pub mod coordinator;
pub mod dedup;
pub mod issue_key;
pub mod lock;
pub mod metrics;
pub mod preview;
pub mod processor;
pub mod scratch;
pub mod source;
pub mod store;
pub mod testing;

pub use artifact::{ArtifactLocation, ArtifactStore, HttpObjectStore, ObjectStore, StorageError};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use coordinator::{RunCoordinator, RunReport, SourceOutcome};
pub use dedup::{DedupError, DedupPayload, DedupRecord, DedupStore, StoredArtifact};
pub use issue_key::IssueKey;
pub use lock::{LockError, LockGuard, LockService};
pub use preview::{CommandPreviewBuilder, PreviewBuilder, PreviewError};
pub use processor::{
    CompletionDetail, IssueOutcome, IssueProcessor, ProcessError, ProcessorSettings, Stage,
};
pub use scratch::{ScratchCleaner, ScratchDirCleaner};
pub use source::{
    build_sources, AcquireError, Acquisition, FanOutContext, FanOutReport, FanOutSource,
    SingleIssueSource, Source,
};
pub use store::{connect_store, KeyValueStore, MemoryStore, StoreError};
