//! Line-oriented rewrite of a declared variable assignment inside a text
//! resource (SCSS-style `$name: value;` declarations).

use crate::platform::{FileIoError, ModelBackend, ModelSession};

/// Stage at which a variable patch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStage {
    /// Reading the source resource.
    Fetch,
    /// Decoding/rewriting the content.
    Transform,
    /// Removing the old resource before writeback.
    Delete,
    /// Writing the rewritten resource.
    Put,
}

impl std::fmt::Display for PatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Fetch => "fetch",
            Self::Transform => "transform",
            Self::Delete => "delete",
            Self::Put => "put",
        };
        f.write_str(name)
    }
}

/// Error type for text-variable patching.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatchError {
    /// Fetching the source resource failed.
    #[error("fetch of {location} failed while setting ${variable}: {source}")]
    Fetch {
        /// Resource path.
        location: String,
        /// Variable being set.
        variable: String,
        /// Underlying file I/O failure.
        source: FileIoError,
    },
    /// The source resource is not valid UTF-8 text.
    #[error("content of {location} is not valid UTF-8 while setting ${variable}: {message}")]
    Transform {
        /// Resource path.
        location: String,
        /// Variable being set.
        variable: String,
        /// Decode error detail.
        message: String,
    },
    /// Removing the old resource failed.
    #[error("delete of {location} failed while setting ${variable}: {source}")]
    Delete {
        /// Resource path.
        location: String,
        /// Variable being set.
        variable: String,
        /// Underlying file I/O failure.
        source: FileIoError,
    },
    /// Writing the rewritten resource failed.
    #[error("put of {location} failed while setting ${variable}: {source}")]
    Put {
        /// Resource path.
        location: String,
        /// Variable being set.
        variable: String,
        /// Underlying file I/O failure.
        source: FileIoError,
    },
}

impl PatchError {
    /// The stage this error is tagged with.
    pub fn stage(&self) -> PatchStage {
        match self {
            Self::Fetch { .. } => PatchStage::Fetch,
            Self::Transform { .. } => PatchStage::Transform,
            Self::Delete { .. } => PatchStage::Delete,
            Self::Put { .. } => PatchStage::Put,
        }
    }
}

/// Rewrite every line declaring `$<variable>:` to `$<variable>: <new_value>;`.
///
/// Matching is exact-prefix on the token `$<variable>:` so `color` never
/// collides with `color2`. Unmatched lines are copied unchanged. Every output
/// line is newline-terminated, including the last; input CRLF line breaks
/// come out as LF. That termination/line-break normalization is observable
/// when the source file ended without a newline.
pub fn rewrite_variable(input: &str, variable: &str, new_value: &str) -> String {
    let prefix = format!("${variable}:");
    let replacement = format!("${variable}: {new_value};");

    let mut out = String::with_capacity(input.len() + replacement.len());
    for line in input.lines() {
        if line.starts_with(&prefix) {
            out.push_str(&replacement);
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

/// Apply a text-variable change through the session: fetch, rewrite, then
/// delete-before-put (the platform requires delete-before-put for this
/// resource kind). Any stage failure is fatal to the change.
pub async fn patch_variable<B: ModelBackend>(
    session: &ModelSession<B>,
    location: &str,
    variable: &str,
    new_value: &str,
) -> Result<(), PatchError> {
    tracing::info!(location, variable, "patching text variable");

    let bytes = session
        .get_file(location)
        .await
        .map_err(|source| PatchError::Fetch {
            location: location.to_string(),
            variable: variable.to_string(),
            source,
        })?;

    let text = String::from_utf8(bytes).map_err(|e| PatchError::Transform {
        location: location.to_string(),
        variable: variable.to_string(),
        message: e.to_string(),
    })?;

    let rewritten = rewrite_variable(&text, variable, new_value);

    session
        .delete_file(location)
        .await
        .map_err(|source| PatchError::Delete {
            location: location.to_string(),
            variable: variable.to_string(),
            source,
        })?;

    session
        .put_file(location, rewritten.into_bytes())
        .await
        .map_err(|source| PatchError::Put {
            location: location.to_string(),
            variable: variable.to_string(),
            source,
        })
}
