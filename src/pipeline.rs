//! Pipeline orchestration: session lifecycle around the change dispatcher
//! plus the flush → export → cleanup → upload tail.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::dispatch::{ChangeDispatcher, DispatchError, DispatchReport};
use crate::platform::{ModelBackend, ModelSession, SessionError};
use crate::store::{ArtifactStore, StorageError};
use crate::types::{PipelineOutcome, PipelineRequest};
use crate::MAIN_LINE;

/// Error type for a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Session lifecycle failure (open/flush/export/cleanup).
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The first failing change in the sequence.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// Uploading the exported artifact failed.
    #[error("failed to upload artifact {key} to {container}: {source}")]
    Upload {
        /// Destination container.
        container: String,
        /// Destination key.
        key: String,
        /// Underlying storage failure.
        source: StorageError,
    },
    /// Local scratch-storage failure around the export file.
    #[error("scratch I/O failure at {path}: {message}")]
    Scratch {
        /// Scratch path involved.
        path: PathBuf,
        /// I/O error detail.
        message: String,
    },
}

/// Drives one pipeline request to completion or first failure.
///
/// Single-threaded and strictly sequential: every I/O operation is awaited
/// immediately, and one request is processed end to end. The working copy is
/// deleted on every exit path once it exists; a cleanup failure after a
/// successful export is reported as a warning in the outcome rather than a
/// run failure, and a cleanup failure on an error path never masks the first
/// error.
pub struct PipelineOrchestrator<B: ModelBackend, S: ArtifactStore> {
    backend: Arc<B>,
    store: Arc<S>,
}

impl<B: ModelBackend, S: ArtifactStore> PipelineOrchestrator<B, S> {
    /// Create an orchestrator over a platform backend and artifact store.
    pub fn new(backend: Arc<B>, store: Arc<S>) -> Self {
        Self { backend, store }
    }

    /// Run one request: open → apply changes → flush → export → cleanup →
    /// upload.
    pub async fn run(&self, request: &PipelineRequest) -> Result<PipelineOutcome, PipelineError> {
        let started_at = Utc::now();
        let request_id = request.correlation_id();
        tracing::info!(
            request_id = %request_id,
            app_id = %request.source_app_id,
            target_key = %request.target_object_key,
            num_changes = request.changes.len(),
            "starting pipeline run"
        );

        let mut session =
            ModelSession::open(Arc::clone(&self.backend), &request.source_app_id, MAIN_LINE)
                .await?;

        let result = self.mutate_and_export(&mut session, request).await;

        // Cleanup runs on every exit path once the session exists. The
        // exported bytes already live in local scratch, so a cleanup failure
        // cannot invalidate them.
        let cleanup_warning = match session.close().await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "working copy cleanup failed");
                Some(e.to_string())
            }
        };

        let (report, artifact) = match result {
            Ok(ok) => ok,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "pipeline run failed");
                return Err(e);
            }
        };

        tracing::info!(
            request_id = %request_id,
            container = %request.storage_container,
            key = %request.target_object_key,
            size = artifact.len(),
            "uploading artifact"
        );
        self.store
            .put(
                &request.storage_container,
                &request.target_object_key,
                artifact,
            )
            .await
            .map_err(|source| PipelineError::Upload {
                container: request.storage_container.clone(),
                key: request.target_object_key.clone(),
                source,
            })?;

        let outcome = PipelineOutcome {
            artifact_key: request.target_object_key.clone(),
            version: request.version.clone(),
            changes_applied: report.applied,
            changes_skipped: report.skipped,
            cleanup_warning,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            request_id = %request_id,
            artifact_key = %outcome.artifact_key,
            changes_applied = outcome.changes_applied,
            "pipeline run complete"
        );
        Ok(outcome)
    }

    async fn mutate_and_export(
        &self,
        session: &mut ModelSession<B>,
        request: &PipelineRequest,
    ) -> Result<(DispatchReport, Vec<u8>), PipelineError> {
        let report = ChangeDispatcher::new(session, &*self.store, &request.storage_container)
            .apply_all(&request.changes)
            .await?;

        session.flush().await?;

        // Per-run-unique scratch directory; removed when the guard drops, on
        // success and failure alike.
        let scratch = tempfile::tempdir().map_err(|e| PipelineError::Scratch {
            path: std::env::temp_dir(),
            message: e.to_string(),
        })?;
        let dest = scratch.path().join("package.mpk");

        session.export(&dest).await?;

        let artifact = std::fs::read(&dest).map_err(|e| PipelineError::Scratch {
            path: dest.clone(),
            message: e.to_string(),
        })?;
        Ok((report, artifact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::InMemoryModelBackend;
    use crate::store::InMemoryArtifactStore;

    fn orchestrator() -> (
        Arc<InMemoryModelBackend>,
        Arc<InMemoryArtifactStore>,
        PipelineOrchestrator<InMemoryModelBackend, InMemoryArtifactStore>,
    ) {
        let backend = Arc::new(InMemoryModelBackend::new());
        backend.add_app("app-1");
        let store = Arc::new(InMemoryArtifactStore::new());
        let orchestrator = PipelineOrchestrator::new(Arc::clone(&backend), Arc::clone(&store));
        (backend, store, orchestrator)
    }

    #[tokio::test]
    async fn test_unknown_app_fails_before_changes() {
        let (backend, _store, orchestrator) = orchestrator();
        let request = PipelineRequest::new("other-app", "export.mpk", "bucket");

        let err = orchestrator.run(&request).await.unwrap_err();
        assert!(matches!(err, PipelineError::Session(SessionError::Open { .. })));
        assert!(!backend.ops().iter().any(|op| op.starts_with("get_file")));
    }

    #[tokio::test]
    async fn test_flush_failure_still_cleans_up() {
        let (backend, _store, orchestrator) = orchestrator();
        backend.fail_flush(true);
        let request = PipelineRequest::new("app-1", "export.mpk", "bucket");

        let err = orchestrator.run(&request).await.unwrap_err();
        assert!(matches!(err, PipelineError::Session(SessionError::Flush { .. })));
        assert_eq!(backend.num_working_copies(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_failure_after_export_is_a_warning() {
        let (backend, store, orchestrator) = orchestrator();
        backend.fail_cleanup(true);
        let request = PipelineRequest::new("app-1", "export.mpk", "bucket");

        // The run still succeeds; the platform-side copy may linger.
        let outcome = orchestrator.run(&request).await.unwrap();
        assert!(outcome.cleanup_warning.is_some());
        assert!(store.object("bucket", "export.mpk").is_some());
        assert_eq!(backend.num_working_copies(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_failure_never_masks_first_error() {
        let (backend, store, orchestrator) = orchestrator();
        backend.fail_flush(true);
        backend.fail_cleanup(true);
        let request = PipelineRequest::new("app-1", "export.mpk", "bucket");

        // The flush failure surfaces, not the later cleanup failure.
        let err = orchestrator.run(&request).await.unwrap_err();
        assert!(matches!(err, PipelineError::Session(SessionError::Flush { .. })));
        assert!(store.object("bucket", "export.mpk").is_none());
    }

    #[tokio::test]
    async fn test_upload_failure_surfaces_storage_cause() {
        let (_backend, store, orchestrator) = orchestrator();
        store.deny("bucket", "export.mpk");
        let request = PipelineRequest::new("app-1", "export.mpk", "bucket");

        let err = orchestrator.run(&request).await.unwrap_err();
        assert!(matches!(err, PipelineError::Upload { .. }));
    }
}
