//! Shared service state.

use std::sync::Arc;

use crate::pipeline::PipelineOrchestrator;
use crate::platform::ModelBackend;
use crate::store::ArtifactStore;

/// Shared state handed to every request handler.
///
/// Holds the orchestrator behind an `Arc`; cloning the state clones handles,
/// not backends.
pub struct ServiceState<B: ModelBackend, S: ArtifactStore> {
    orchestrator: Arc<PipelineOrchestrator<B, S>>,
}

impl<B: ModelBackend, S: ArtifactStore> ServiceState<B, S> {
    /// Create service state over a platform backend and artifact store.
    pub fn new(backend: Arc<B>, store: Arc<S>) -> Self {
        Self {
            orchestrator: Arc::new(PipelineOrchestrator::new(backend, store)),
        }
    }

    /// The shared orchestrator.
    pub fn orchestrator(&self) -> &PipelineOrchestrator<B, S> {
        &self.orchestrator
    }
}

// Manual impl: `derive(Clone)` would wrongly require B: Clone and S: Clone.
impl<B: ModelBackend, S: ArtifactStore> Clone for ServiceState<B, S> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
        }
    }
}
