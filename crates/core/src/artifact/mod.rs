//! Dual-tier artifact persistence.
//!
//! Every artifact is first copied into the durable local tier, laid out as
//! `{data_root}/{source}/{date}/{file}`. Only then is an upload to the remote
//! object store attempted, under the same key. Remote failures never reach
//! the caller: they are logged, counted, and leave the returned location
//! without a remote URI.
//!
//! The store never deletes the file it is given; cleaning up scratch space is
//! the issue processor's job.
//!
//! # Example
//!
//! ```ignore
//! use newsstand_core::artifact::{ArtifactStore, HttpObjectStore};
//!
//! let remote = HttpObjectStore::new(&config.remote)?;
//! remote.ensure_bucket().await?;
//! let store = ArtifactStore::new(config.paths.data_root()).with_remote(Arc::new(remote));
//!
//! let location = store.save(&scratch_pdf, "etemad/2024-01-01/etemad-1704067200.pdf").await?;
//! println!("local: {}, remote: {:?}", location.local.display(), location.remote);
//! ```

mod error;
mod local;
mod remote;
mod store;
mod types;

pub use error::{RemoteError, StorageError};
pub use local::LocalTier;
pub use remote::{HttpObjectStore, ObjectStore};
pub use store::ArtifactStore;
pub use types::ArtifactLocation;
