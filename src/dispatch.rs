//! Ordered, fail-fast application of change descriptors.

use serde::Serialize;

use crate::images::{apply_image_change, ImageChangeError};
use crate::patch::{patch_variable, PatchError};
use crate::platform::{ModelBackend, ModelSession};
use crate::store::ArtifactStore;
use crate::types::{ChangeDescriptor, ChangeType, InvalidChange};

/// Failure cause of a single change.
#[derive(Debug, thiserror::Error)]
pub enum ChangeError {
    /// A field the change type requires was missing.
    #[error(transparent)]
    Invalid(#[from] InvalidChange),
    /// A text-variable patch failed.
    #[error(transparent)]
    Patch(#[from] PatchError),
    /// An image-collection change failed.
    #[error(transparent)]
    Image(#[from] ImageChangeError),
}

/// First failure in a change sequence, with the identity of the failing
/// change. Changes after the failing index were never attempted.
#[derive(Debug, thiserror::Error)]
#[error("change {index} ({change_type}, location {location}, item {item_name}) failed: {source}")]
pub struct DispatchError {
    /// Zero-based position in the request's change list.
    pub index: usize,
    /// Declared type of the failing change.
    pub change_type: ChangeType,
    /// Location the change targeted.
    pub location: String,
    /// Item the change targeted.
    pub item_name: String,
    /// Underlying cause.
    #[source]
    pub source: ChangeError,
}

/// Counts from a fully processed change sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Changes applied.
    pub applied: usize,
    /// Unsupported changes skipped.
    pub skipped: usize,
}

/// Applies an ordered change list through a model session and artifact store.
///
/// Strictly sequential: each change is awaited to completion before the next
/// starts, and the first failure aborts the run with no further attempts.
pub struct ChangeDispatcher<'a, B: ModelBackend, S: ArtifactStore> {
    session: &'a ModelSession<B>,
    store: &'a S,
    container: &'a str,
}

impl<'a, B: ModelBackend, S: ArtifactStore> ChangeDispatcher<'a, B, S> {
    /// Create a dispatcher over an open session.
    ///
    /// `container` is the artifact-store container replacement image bytes
    /// are fetched from.
    pub fn new(session: &'a ModelSession<B>, store: &'a S, container: &'a str) -> Self {
        Self {
            session,
            store,
            container,
        }
    }

    /// Apply all changes in order, fail-fast.
    ///
    /// Unsupported change types are skipped with a warning and counted in
    /// the report rather than aborting the run (forward compatibility with
    /// newer request producers).
    pub async fn apply_all(
        &self,
        changes: &[ChangeDescriptor],
    ) -> Result<DispatchReport, DispatchError> {
        let mut report = DispatchReport::default();

        for (index, change) in changes.iter().enumerate() {
            if change.change_type == ChangeType::Unsupported {
                tracing::warn!(
                    index,
                    location = %change.location,
                    item_name = %change.item_name,
                    "skipping unsupported change type"
                );
                report.skipped += 1;
                continue;
            }

            self.apply_one(change).await.map_err(|source| DispatchError {
                index,
                change_type: change.change_type,
                location: change.location.clone(),
                item_name: change.item_name.clone(),
                source,
            })?;
            report.applied += 1;
        }

        tracing::info!(
            applied = report.applied,
            skipped = report.skipped,
            "change sequence complete"
        );
        Ok(report)
    }

    async fn apply_one(&self, change: &ChangeDescriptor) -> Result<(), ChangeError> {
        change.validate()?;

        match change.change_type {
            ChangeType::TextVariable => {
                patch_variable(
                    self.session,
                    &change.location,
                    &change.item_name,
                    &change.new_value,
                )
                .await?;
            }
            ChangeType::ImageCollectionImage => {
                apply_image_change(
                    self.session,
                    self.store,
                    self.container,
                    &change.location,
                    &change.item_name,
                    &change.object_name,
                    change.format,
                )
                .await?;
            }
            // Filtered out by apply_all.
            ChangeType::Unsupported => {}
        }
        Ok(())
    }
}
