//! Per-run model session lifecycle.
//!
//! `Closed → Opening → Open → Flushing → Exporting → Closed`. The session is
//! created already past `Opening` (a failed open never yields a session) and
//! enforces flush-before-export at runtime. Cleanup is callable from every
//! state so the orchestrator can release the working copy on any exit path.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{FileIoError, LookupError, ModelBackend, SessionError, WorkingCopyId};
use crate::types::{ImageAsset, ImageCollection};

/// Lifecycle state of a model session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No working copy is held.
    Closed,
    /// Working copy and model are being acquired.
    Opening,
    /// Mutations may be staged. The only state the dispatcher operates in.
    Open,
    /// Staged mutations have been committed; export may begin.
    Flushing,
    /// The committed model has been serialized to a package.
    Exporting,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Flushing => "flushing",
            Self::Exporting => "exporting",
        };
        f.write_str(name)
    }
}

/// An open handle into one working copy for the lifetime of a pipeline run.
///
/// Exclusively owned by the orchestrator; never shared across runs.
#[derive(Debug)]
pub struct ModelSession<B: ModelBackend> {
    backend: Arc<B>,
    app_id: String,
    working_copy: WorkingCopyId,
    state: SessionState,
}

impl<B: ModelBackend> ModelSession<B> {
    /// Open a session: create a temporary working copy from the app's main
    /// line and open its model.
    ///
    /// If the model fails to open after the working copy was created, the
    /// copy is deleted best-effort before the error is returned, so a failed
    /// open never leaks platform-side state.
    pub async fn open(backend: Arc<B>, app_id: &str, branch: &str) -> Result<Self, SessionError> {
        tracing::info!(app_id, branch, "creating temporary working copy");
        let working_copy = backend.create_working_copy(app_id, branch).await?;

        tracing::info!(working_copy = %working_copy, "opening model");
        if let Err(open_err) = backend.open_model(&working_copy).await {
            if let Err(cleanup_err) = backend.delete_working_copy(&working_copy).await {
                tracing::warn!(
                    working_copy = %working_copy,
                    error = %cleanup_err,
                    "failed to delete working copy after open failure"
                );
            }
            return Err(open_err);
        }

        Ok(Self {
            backend,
            app_id: app_id.to_string(),
            working_copy,
            state: SessionState::Open,
        })
    }

    /// Source application this session was opened from.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// The working copy this session owns.
    pub fn working_copy(&self) -> &WorkingCopyId {
        &self.working_copy
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn require(&self, expected: SessionState) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                state: self.state,
                expected,
            })
        }
    }

    /// Read a resource's bytes from the model. Requires `Open`.
    pub async fn get_file(&self, location: &str) -> Result<Vec<u8>, FileIoError> {
        self.require(SessionState::Open)?;
        self.backend.get_file(&self.working_copy, location).await
    }

    /// Stage a resource write. Requires `Open`.
    pub async fn put_file(&self, location: &str, bytes: Vec<u8>) -> Result<(), FileIoError> {
        self.require(SessionState::Open)?;
        self.backend
            .put_file(&self.working_copy, location, bytes)
            .await
    }

    /// Stage a resource deletion. Requires `Open`.
    pub async fn delete_file(&self, location: &str) -> Result<(), FileIoError> {
        self.require(SessionState::Open)?;
        self.backend.delete_file(&self.working_copy, location).await
    }

    /// Qualified names of all image collections in the model. Requires `Open`.
    pub async fn collection_names(&self) -> Result<Vec<String>, FileIoError> {
        self.require(SessionState::Open)?;
        self.backend.collection_names(&self.working_copy).await
    }

    /// Materialize a collection's asset list. Requires `Open`.
    pub async fn load_collection(
        &self,
        qualified_name: &str,
    ) -> Result<ImageCollection, LookupError> {
        self.require(SessionState::Open)?;
        self.backend
            .load_collection(&self.working_copy, qualified_name)
            .await
    }

    /// Stage deletion of a named asset. Requires `Open`.
    pub async fn delete_image(&self, qualified_name: &str, name: &str) -> Result<(), LookupError> {
        self.require(SessionState::Open)?;
        self.backend
            .delete_image(&self.working_copy, qualified_name, name)
            .await
    }

    /// Stage creation of a new asset. Requires `Open`.
    pub async fn create_image(
        &self,
        qualified_name: &str,
        asset: ImageAsset,
    ) -> Result<(), LookupError> {
        self.require(SessionState::Open)?;
        self.backend
            .create_image(&self.working_copy, qualified_name, asset)
            .await
    }

    /// Commit all staged mutations. Requires `Open`; on success the session
    /// is in `Flushing` and ready to export.
    pub async fn flush(&mut self) -> Result<(), SessionError> {
        self.require(SessionState::Open)?;
        tracing::info!(working_copy = %self.working_copy, "flushing changes");
        self.backend.flush_changes(&self.working_copy).await?;
        self.state = SessionState::Flushing;
        Ok(())
    }

    /// Serialize the committed model into a package at `dest`. Requires a
    /// successful `flush` first.
    pub async fn export(&mut self, dest: &Path) -> Result<(), SessionError> {
        self.require(SessionState::Flushing)?;
        tracing::info!(working_copy = %self.working_copy, dest = %dest.display(), "exporting package");
        self.backend.export_package(&self.working_copy, dest).await?;
        self.state = SessionState::Exporting;
        Ok(())
    }

    /// Delete the working copy. Callable from any state; idempotent once the
    /// session is `Closed`.
    pub async fn close(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        tracing::info!(working_copy = %self.working_copy, "deleting working copy");
        self.backend.delete_working_copy(&self.working_copy).await?;
        self.state = SessionState::Closed;
        Ok(())
    }
}
