//! Artifact storage backends.
//!
//! The artifact store is used twice per run: to source replacement image
//! bytes and to upload the final packaged export.

pub mod fs;
pub mod memory;

use async_trait::async_trait;

/// Error type for artifact-store operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// The object does not exist.
    #[error("object not found: {container}/{key}")]
    NotFound {
        /// Container the lookup targeted.
        container: String,
        /// Object key.
        key: String,
    },
    /// The object exists but is not readable/writable by this caller.
    #[error("access denied: {container}/{key}")]
    AccessDenied {
        /// Container the operation targeted.
        container: String,
        /// Object key.
        key: String,
    },
    /// The object exists but carries no payload.
    #[error("object is empty: {container}/{key}")]
    EmptyObject {
        /// Container the lookup targeted.
        container: String,
        /// Object key.
        key: String,
    },
    /// Any other read/write failure.
    #[error("storage I/O failure on {container}/{key}: {message}")]
    Io {
        /// Container the operation targeted.
        container: String,
        /// Object key.
        key: String,
        /// Backend-specific detail.
        message: String,
    },
}

/// Trait for named-blob storage backends.
///
/// All methods are async; within one pipeline run every call is awaited
/// immediately, so implementations never see concurrent access from a run.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetch an object's bytes.
    async fn get(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Store an object, overwriting any existing one under the same key.
    async fn put(&self, container: &str, key: &str, bytes: Vec<u8>) -> Result<(), StorageError>;
}

pub use fs::FsArtifactStore;
pub use memory::InMemoryArtifactStore;
