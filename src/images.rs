//! Replacement of named binary assets inside model image collections,
//! sourcing new bytes from the artifact store.

use crate::platform::{FileIoError, LookupError, ModelBackend, ModelSession};
use crate::store::{ArtifactStore, StorageError};
use crate::types::{ImageAsset, ImageFormat};

/// Stage at which an image change failed.
///
/// `Search` is listed for completeness of the stage set; searching a loaded
/// collection cannot itself fail, and an absent asset only means there is
/// nothing to delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStage {
    /// Enumerating collections / matching the qualified name.
    Lookup,
    /// Materializing the collection's asset list.
    Load,
    /// Finding the existing asset by name.
    Search,
    /// Deleting the existing asset.
    Delete,
    /// Fetching replacement bytes from the artifact store.
    Fetch,
    /// Creating the new asset.
    Create,
}

impl std::fmt::Display for ImageStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Lookup => "lookup",
            Self::Load => "load",
            Self::Search => "search",
            Self::Delete => "delete",
            Self::Fetch => "fetch",
            Self::Create => "create",
        };
        f.write_str(name)
    }
}

/// Error type for image-collection changes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ImageChangeError {
    /// Listing collections failed.
    #[error("failed to list image collections: {source}")]
    Lookup {
        /// Underlying model I/O failure.
        source: FileIoError,
    },
    /// No collection matches the qualified name.
    #[error("cannot find image collection {qualified_name}")]
    CollectionNotFound {
        /// Qualified name the change targeted.
        qualified_name: String,
    },
    /// Loading the collection failed.
    #[error("failed to load image collection {qualified_name}: {source}")]
    Load {
        /// Qualified collection name.
        qualified_name: String,
        /// Underlying lookup failure.
        source: LookupError,
    },
    /// Deleting the existing asset failed.
    #[error("failed to delete image {name} from {qualified_name}: {source}")]
    Delete {
        /// Qualified collection name.
        qualified_name: String,
        /// Asset name.
        name: String,
        /// Underlying lookup failure.
        source: LookupError,
    },
    /// Fetching the replacement bytes failed (missing, denied, or empty).
    #[error("failed to fetch replacement object {key} from {container}: {source}")]
    Fetch {
        /// Artifact-store container.
        container: String,
        /// Object key.
        key: String,
        /// Underlying storage failure.
        source: StorageError,
    },
    /// Creating the new asset failed.
    #[error("failed to create image {name} in {qualified_name}: {source}")]
    Create {
        /// Qualified collection name.
        qualified_name: String,
        /// Asset name.
        name: String,
        /// Underlying lookup failure.
        source: LookupError,
    },
}

impl ImageChangeError {
    /// The stage this error is tagged with.
    pub fn stage(&self) -> ImageStage {
        match self {
            Self::Lookup { .. } | Self::CollectionNotFound { .. } => ImageStage::Lookup,
            Self::Load { .. } => ImageStage::Load,
            Self::Delete { .. } => ImageStage::Delete,
            Self::Fetch { .. } => ImageStage::Fetch,
            Self::Create { .. } => ImageStage::Create,
        }
    }
}

/// Replace (or introduce) a named asset in an image collection.
///
/// Replacement is delete-then-create, never an in-place update. The
/// replacement bytes are fetched before any model mutation, so a missing or
/// empty object aborts the change with the model untouched.
pub async fn apply_image_change<B, S>(
    session: &ModelSession<B>,
    store: &S,
    container: &str,
    qualified_name: &str,
    item_name: &str,
    object_name: &str,
    format: ImageFormat,
) -> Result<(), ImageChangeError>
where
    B: ModelBackend,
    S: ArtifactStore,
{
    tracing::info!(
        qualified_name,
        item_name,
        object_name,
        %format,
        "applying image collection change"
    );

    // 1. Exact qualified-name match among all visible collections.
    let names = session
        .collection_names()
        .await
        .map_err(|source| ImageChangeError::Lookup { source })?;
    if !names.iter().any(|n| n == qualified_name) {
        return Err(ImageChangeError::CollectionNotFound {
            qualified_name: qualified_name.to_string(),
        });
    }

    // 2. Materialize the asset list.
    let collection = session
        .load_collection(qualified_name)
        .await
        .map_err(|source| ImageChangeError::Load {
            qualified_name: qualified_name.to_string(),
            source,
        })?;

    // 3. Exact name match; absence means create-only.
    let existing = collection.asset(item_name).is_some();

    // 4. Fetch the replacement bytes before mutating the model.
    let bytes = store
        .get(container, object_name)
        .await
        .map_err(|source| ImageChangeError::Fetch {
            container: container.to_string(),
            key: object_name.to_string(),
            source,
        })?;
    if bytes.is_empty() {
        return Err(ImageChangeError::Fetch {
            container: container.to_string(),
            key: object_name.to_string(),
            source: StorageError::EmptyObject {
                container: container.to_string(),
                key: object_name.to_string(),
            },
        });
    }

    // 5. Replace semantics: fully remove the old asset first.
    if existing {
        session
            .delete_image(qualified_name, item_name)
            .await
            .map_err(|source| ImageChangeError::Delete {
                qualified_name: qualified_name.to_string(),
                name: item_name.to_string(),
                source,
            })?;
    }

    // 6. Create the new asset.
    session
        .create_image(qualified_name, ImageAsset::new(item_name, bytes, format))
        .await
        .map_err(|source| ImageChangeError::Create {
            qualified_name: qualified_name.to_string(),
            name: item_name.to_string(),
            source,
        })
}
