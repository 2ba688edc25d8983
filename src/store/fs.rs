//! Filesystem-directory artifact store.
//!
//! Maps a container to a subdirectory of a root path and a key to a file
//! inside it. Intended for local and development deployments; remote object
//! stores implement [`ArtifactStore`](super::ArtifactStore) out of tree.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::{ArtifactStore, StorageError};

/// Artifact store backed by a local directory tree.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// first `put`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, container: &str, key: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(container).join(key);

        // Keys must stay inside the root.
        let escapes = rel
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if container.is_empty() || key.is_empty() || escapes {
            return Err(StorageError::Io {
                container: container.to_string(),
                key: key.to_string(),
                message: "invalid container or key path".to_string(),
            });
        }

        Ok(self.root.join(rel))
    }

    fn map_io(container: &str, key: &str, err: std::io::Error) -> StorageError {
        match err.kind() {
            ErrorKind::NotFound => StorageError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            },
            ErrorKind::PermissionDenied => StorageError::AccessDenied {
                container: container.to_string(),
                key: key.to_string(),
            },
            _ => StorageError::Io {
                container: container.to_string(),
                key: key.to_string(),
                message: err.to_string(),
            },
        }
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn get(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(container, key)?;
        std::fs::read(&path).map_err(|e| Self::map_io(container, key, e))
    }

    async fn put(&self, container: &str, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let path = self.object_path(container, key)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Self::map_io(container, key, e))?;
        }
        std::fs::write(&path, bytes).map_err(|e| Self::map_io(container, key, e))
    }
}
