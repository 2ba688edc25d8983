//! In-memory artifact store for testing.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ArtifactStore, StorageError};

/// In-memory artifact store for tests and local runs.
///
/// Uses BTreeMap for deterministic iteration order. Objects can be marked
/// denied to exercise the `AccessDenied` path.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<(String, String), Vec<u8>>,
    denied: BTreeSet<(String, String)>,
}

impl InMemoryArtifactStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object.
    pub fn insert(&self, container: &str, key: &str, bytes: Vec<u8>) {
        self.inner
            .lock()
            .objects
            .insert((container.to_string(), key.to_string()), bytes);
    }

    /// Mark an object key as unreadable/unwritable.
    pub fn deny(&self, container: &str, key: &str) {
        self.inner
            .lock()
            .denied
            .insert((container.to_string(), key.to_string()));
    }

    /// Fetch an object without going through the trait (test inspection).
    pub fn object(&self, container: &str, key: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .objects
            .get(&(container.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.inner.lock().objects.len()
    }

    /// True when the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().objects.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn get(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let inner = self.inner.lock();
        let id = (container.to_string(), key.to_string());

        if inner.denied.contains(&id) {
            return Err(StorageError::AccessDenied {
                container: container.to_string(),
                key: key.to_string(),
            });
        }

        inner
            .objects
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(&self, container: &str, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        let id = (container.to_string(), key.to_string());

        if inner.denied.contains(&id) {
            return Err(StorageError::AccessDenied {
                container: container.to_string(),
                key: key.to_string(),
            });
        }

        inner.objects.insert(id, bytes);
        Ok(())
    }
}
