//! Pipeline request and outcome types.
//!
//! `PipelineRequest` carries the external wire shape (PascalCase keys) so the
//! service layer can deserialize the incoming event directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::change::ChangeDescriptor;

fn fresh_request_id() -> String {
    Uuid::new_v4().to_string()
}

fn request_id_or_fresh<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let id = String::deserialize(deserializer)?;
    Ok(if id.is_empty() { fresh_request_id() } else { id })
}

/// One unit of pipeline work: which app to mutate, what to change, and where
/// the exported artifact goes.
///
/// Ordering of `changes` is significant and preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// Source application whose main line seeds the working copy.
    #[serde(rename = "TemplateAppId")]
    pub source_app_id: String,
    /// Key under which the exported package is uploaded.
    #[serde(rename = "MpkObjectName")]
    pub target_object_key: String,
    /// Artifact-store container used for both image sources and the upload.
    #[serde(rename = "Bucket")]
    pub storage_container: String,
    /// Caller-supplied correlation ID; filled with a fresh UUID at
    /// deserialization when the caller sent none, so it is stable for the
    /// lifetime of the request.
    #[serde(
        rename = "RequestId",
        default = "fresh_request_id",
        deserialize_with = "request_id_or_fresh"
    )]
    pub request_id: String,
    /// Caller-supplied request schema version, echoed in the outcome.
    #[serde(rename = "version", default)]
    pub version: String,
    /// Ordered changes to apply before export.
    #[serde(rename = "Changes", default)]
    pub changes: Vec<ChangeDescriptor>,
}

impl PipelineRequest {
    /// Create a request with no changes and a fresh correlation ID.
    pub fn new(
        source_app_id: impl Into<String>,
        target_object_key: impl Into<String>,
        storage_container: impl Into<String>,
    ) -> Self {
        Self {
            source_app_id: source_app_id.into(),
            target_object_key: target_object_key.into(),
            storage_container: storage_container.into(),
            request_id: fresh_request_id(),
            version: String::new(),
            changes: Vec::new(),
        }
    }

    /// The correlation ID for this request. Stable across calls; a missing
    /// or empty wire value was replaced with a fresh UUID when the request
    /// was built.
    pub fn correlation_id(&self) -> &str {
        &self.request_id
    }
}

/// Report of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// Key of the uploaded artifact.
    pub artifact_key: String,
    /// Request schema version echoed from the request.
    pub version: String,
    /// Changes applied by the dispatcher.
    pub changes_applied: usize,
    /// Unsupported changes skipped by the dispatcher.
    pub changes_skipped: usize,
    /// Set when working-copy cleanup failed after a successful export.
    /// The artifact is still valid; the platform-side copy may linger.
    pub cleanup_warning: Option<String>,
    /// Run start (UTC).
    pub started_at: DateTime<Utc>,
    /// Run end (UTC).
    pub finished_at: DateTime<Utc>,
}
