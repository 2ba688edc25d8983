//! Model-hosting platform backends.
//!
//! A backend is the abstract platform API the pipeline drives: working-copy
//! lifecycle, file-level access to model resources, and image-collection
//! queries and mutations. [`ModelSession`](session::ModelSession) wraps a
//! backend with the per-run lifecycle state machine.

pub mod memory;
pub mod session;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{ImageAsset, ImageCollection};

/// Identifier of a temporary working copy on the platform.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkingCopyId(String);

impl WorkingCopyId {
    /// Wrap a platform-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkingCopyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error type for session-lifecycle operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// Acquiring the app, creating the working copy, or opening the model
    /// failed. Aborts the pipeline before any change is attempted.
    #[error("failed to open app {app_id}: {message}")]
    Open {
        /// Source application.
        app_id: String,
        /// Platform-specific detail.
        message: String,
    },
    /// Committing staged mutations failed. No partial-commit guarantees.
    #[error("failed to flush changes for working copy {working_copy}: {message}")]
    Flush {
        /// The working copy being committed.
        working_copy: WorkingCopyId,
        /// Platform-specific detail.
        message: String,
    },
    /// Serializing the committed model into a package failed.
    #[error("failed to export package from working copy {working_copy}: {message}")]
    Export {
        /// The working copy being exported.
        working_copy: WorkingCopyId,
        /// Platform-specific detail.
        message: String,
    },
    /// Deleting the working copy failed. After a successful export this is a
    /// warning, not a pipeline failure.
    #[error("failed to delete working copy {working_copy}: {message}")]
    Cleanup {
        /// The working copy being deleted.
        working_copy: WorkingCopyId,
        /// Platform-specific detail.
        message: String,
    },
    /// A lifecycle method was called out of order.
    #[error("model session is {state} but the operation requires {expected}")]
    InvalidState {
        /// Current session state.
        state: session::SessionState,
        /// State the operation requires.
        expected: session::SessionState,
    },
}

/// Error type for file-level model resource access.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FileIoError {
    /// Reading a resource failed.
    #[error("failed to get {location} from working copy {working_copy}: {message}")]
    Get {
        /// The working copy.
        working_copy: WorkingCopyId,
        /// Resource path inside the model.
        location: String,
        /// Platform-specific detail.
        message: String,
    },
    /// Writing a resource failed.
    #[error("failed to put {location} into working copy {working_copy}: {message}")]
    Put {
        /// The working copy.
        working_copy: WorkingCopyId,
        /// Resource path inside the model.
        location: String,
        /// Platform-specific detail.
        message: String,
    },
    /// Deleting a resource failed.
    #[error("failed to delete {location} from working copy {working_copy}: {message}")]
    Delete {
        /// The working copy.
        working_copy: WorkingCopyId,
        /// Resource path inside the model.
        location: String,
        /// Platform-specific detail.
        message: String,
    },
    /// The resource does not exist in the model.
    #[error("resource not found in working copy {working_copy}: {location}")]
    NotFound {
        /// The working copy.
        working_copy: WorkingCopyId,
        /// Resource path inside the model.
        location: String,
    },
    /// The session is not in a state that permits resource access.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Error type for collection and asset lookups inside the model.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LookupError {
    /// No collection with the given qualified name is visible in the model.
    #[error("cannot find image collection {qualified_name}")]
    CollectionNotFound {
        /// Qualified name the lookup used.
        qualified_name: String,
    },
    /// The collection exists but holds no asset with the given name.
    #[error("cannot find image {name} in collection {qualified_name}")]
    ImageNotFound {
        /// Qualified collection name.
        qualified_name: String,
        /// Asset name the lookup used.
        name: String,
    },
    /// The session is not in a state that permits collection access.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Trait for model-hosting platform backends.
///
/// One working copy is exclusively owned by one pipeline run; the platform
/// provides no mutual exclusion beyond that isolation. Mutations stay staged
/// in the working copy until `flush_changes` succeeds.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Create a temporary working copy of an app from the named line.
    async fn create_working_copy(
        &self,
        app_id: &str,
        branch: &str,
    ) -> Result<WorkingCopyId, SessionError>;

    /// Open the working copy's model for reading and staging mutations.
    async fn open_model(&self, working_copy: &WorkingCopyId) -> Result<(), SessionError>;

    /// Read a model resource's bytes.
    async fn get_file(
        &self,
        working_copy: &WorkingCopyId,
        location: &str,
    ) -> Result<Vec<u8>, FileIoError>;

    /// Stage a resource write.
    async fn put_file(
        &self,
        working_copy: &WorkingCopyId,
        location: &str,
        bytes: Vec<u8>,
    ) -> Result<(), FileIoError>;

    /// Stage a resource deletion.
    async fn delete_file(
        &self,
        working_copy: &WorkingCopyId,
        location: &str,
    ) -> Result<(), FileIoError>;

    /// Qualified names of all image collections visible in the model.
    async fn collection_names(
        &self,
        working_copy: &WorkingCopyId,
    ) -> Result<Vec<String>, FileIoError>;

    /// Materialize a collection's asset list.
    async fn load_collection(
        &self,
        working_copy: &WorkingCopyId,
        qualified_name: &str,
    ) -> Result<ImageCollection, LookupError>;

    /// Stage deletion of a named asset from a collection.
    async fn delete_image(
        &self,
        working_copy: &WorkingCopyId,
        qualified_name: &str,
        name: &str,
    ) -> Result<(), LookupError>;

    /// Stage creation of a new asset in a collection.
    async fn create_image(
        &self,
        working_copy: &WorkingCopyId,
        qualified_name: &str,
        asset: ImageAsset,
    ) -> Result<(), LookupError>;

    /// Commit all staged mutations.
    async fn flush_changes(&self, working_copy: &WorkingCopyId) -> Result<(), SessionError>;

    /// Serialize the committed model into a package file at `dest`.
    async fn export_package(
        &self,
        working_copy: &WorkingCopyId,
        dest: &Path,
    ) -> Result<(), SessionError>;

    /// Delete the working copy, releasing platform-side resources.
    async fn delete_working_copy(&self, working_copy: &WorkingCopyId) -> Result<(), SessionError>;
}

pub use memory::InMemoryModelBackend;
pub use session::{ModelSession, SessionState};
