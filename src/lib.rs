//! # appforge
//!
//! Change-application pipeline for versioned application models.
//!
//! Given a declarative list of changes, a pipeline run:
//!
//! 1. Opens a model session (temporary working copy of a source app)
//! 2. Applies each change in order via a type-specific mutator, fail-fast
//! 3. Flushes staged mutations, exports the packaged artifact
//! 4. Deletes the working copy and uploads the artifact
//!
//! ## Architecture
//!
//! ```text
//! PipelineRequest → PipelineOrchestrator → ChangeDispatcher → { TextVariablePatcher
//!                          ↓                                  , ImageCollectionMutator }
//!                    ModelSession ←──────────────────────────────────┘
//!                    (ModelBackend)            ArtifactStore (bytes in, package out)
//! ```
//!
//! ## Failure Contract
//!
//! - Strictly sequential, no retries, no rollback: the first failing stage
//!   aborts the run with the failing change's identity and cause
//! - Nothing is durable until flush succeeds; aborted runs lose staged work
//! - The working copy is deleted on every exit path once it exists

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatch;
pub mod images;
pub mod patch;
pub mod pipeline;
pub mod platform;
pub mod store;
pub mod types;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use dispatch::{ChangeDispatcher, ChangeError, DispatchError, DispatchReport};
pub use images::{apply_image_change, ImageChangeError, ImageStage};
pub use patch::{patch_variable, rewrite_variable, PatchError, PatchStage};
pub use pipeline::{PipelineError, PipelineOrchestrator};
pub use platform::{
    FileIoError, InMemoryModelBackend, LookupError, ModelBackend, ModelSession, SessionError,
    SessionState, WorkingCopyId,
};
pub use store::{ArtifactStore, FsArtifactStore, InMemoryArtifactStore, StorageError};
pub use types::{
    ChangeDescriptor, ChangeType, ImageAsset, ImageCollection, ImageFormat, InvalidChange,
    PipelineOutcome, PipelineRequest,
};

#[cfg(feature = "service")]
pub use service::{create_router, PipelineResponse, ServiceState};

/// Line of the source app from which working copies are created.
pub const MAIN_LINE: &str = "main";
