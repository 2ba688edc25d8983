//! In-memory model backend for testing.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{FileIoError, LookupError, ModelBackend, SessionError, WorkingCopyId};
use crate::types::{ImageAsset, ImageCollection};

/// On-disk shape the in-memory backend exports.
///
/// A JSON stand-in for a real packaged model; integration tests deserialize
/// it to assert what the committed model contained at export time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedPackage {
    /// Source application the working copy was created from.
    pub app_id: String,
    /// Model resources by location.
    pub files: BTreeMap<String, Vec<u8>>,
    /// Image collections by qualified name.
    pub collections: BTreeMap<String, ImageCollection>,
}

#[derive(Debug, Clone, Default)]
struct AppTemplate {
    files: BTreeMap<String, Vec<u8>>,
    collections: BTreeMap<String, ImageCollection>,
}

#[derive(Debug, Clone)]
struct CopyState {
    app_id: String,
    files: BTreeMap<String, Vec<u8>>,
    collections: BTreeMap<String, ImageCollection>,
}

#[derive(Debug, Default)]
struct Inner {
    apps: BTreeMap<String, AppTemplate>,
    copies: BTreeMap<WorkingCopyId, CopyState>,
    ops: Vec<String>,
    next_copy: u64,
    fail_flush: bool,
    fail_open_model: bool,
    fail_cleanup: bool,
}

/// In-memory model backend for tests and local runs.
///
/// Seed an app template with `add_app` / `add_template_file` /
/// `add_template_collection`; every working copy starts as a clone of its
/// template. Records an ordered operation log so tests can assert fail-fast
/// and cleanup behavior.
#[derive(Debug, Default)]
pub struct InMemoryModelBackend {
    inner: Mutex<Inner>,
}

impl InMemoryModelBackend {
    /// Create a backend with no apps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an app template.
    pub fn add_app(&self, app_id: &str) {
        self.inner
            .lock()
            .apps
            .entry(app_id.to_string())
            .or_default();
    }

    /// Add a resource to an app template.
    pub fn add_template_file(&self, app_id: &str, location: &str, bytes: Vec<u8>) {
        self.inner
            .lock()
            .apps
            .entry(app_id.to_string())
            .or_default()
            .files
            .insert(location.to_string(), bytes);
    }

    /// Add an image collection to an app template.
    pub fn add_template_collection(&self, app_id: &str, collection: ImageCollection) {
        self.inner
            .lock()
            .apps
            .entry(app_id.to_string())
            .or_default()
            .collections
            .insert(collection.qualified_name.clone(), collection);
    }

    /// Make the next `flush_changes` call fail.
    pub fn fail_flush(&self, fail: bool) {
        self.inner.lock().fail_flush = fail;
    }

    /// Make the next `open_model` call fail.
    pub fn fail_open_model(&self, fail: bool) {
        self.inner.lock().fail_open_model = fail;
    }

    /// Make the next `delete_working_copy` call fail.
    pub fn fail_cleanup(&self, fail: bool) {
        self.inner.lock().fail_cleanup = fail;
    }

    /// Snapshot of the ordered operation log.
    pub fn ops(&self) -> Vec<String> {
        self.inner.lock().ops.clone()
    }

    /// Whether a working copy still exists on the backend.
    pub fn working_copy_exists(&self, working_copy: &WorkingCopyId) -> bool {
        self.inner.lock().copies.contains_key(working_copy)
    }

    /// Number of live working copies.
    pub fn num_working_copies(&self) -> usize {
        self.inner.lock().copies.len()
    }

    fn record(inner: &mut Inner, op: String) {
        inner.ops.push(op);
    }

    fn copy_mut<'a>(
        inner: &'a mut Inner,
        working_copy: &WorkingCopyId,
    ) -> Option<&'a mut CopyState> {
        inner.copies.get_mut(working_copy)
    }
}

#[async_trait]
impl ModelBackend for InMemoryModelBackend {
    async fn create_working_copy(
        &self,
        app_id: &str,
        branch: &str,
    ) -> Result<WorkingCopyId, SessionError> {
        let mut inner = self.inner.lock();
        Self::record(&mut inner, format!("create_working_copy {app_id} {branch}"));

        let template = inner
            .apps
            .get(app_id)
            .cloned()
            .ok_or_else(|| SessionError::Open {
                app_id: app_id.to_string(),
                message: "app not found".to_string(),
            })?;

        inner.next_copy += 1;
        let id = WorkingCopyId::new(format!("wc-{}", inner.next_copy));
        inner.copies.insert(
            id.clone(),
            CopyState {
                app_id: app_id.to_string(),
                files: template.files,
                collections: template.collections,
            },
        );
        Ok(id)
    }

    async fn open_model(&self, working_copy: &WorkingCopyId) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        Self::record(&mut inner, format!("open_model {working_copy}"));

        if inner.fail_open_model {
            return Err(SessionError::Open {
                app_id: String::new(),
                message: "injected open_model failure".to_string(),
            });
        }

        Self::copy_mut(&mut inner, working_copy)
            .map(|_| ())
            .ok_or_else(|| SessionError::Open {
                app_id: String::new(),
                message: format!("unknown working copy {working_copy}"),
            })
    }

    async fn get_file(
        &self,
        working_copy: &WorkingCopyId,
        location: &str,
    ) -> Result<Vec<u8>, FileIoError> {
        let mut inner = self.inner.lock();
        Self::record(&mut inner, format!("get_file {location}"));

        let copy =
            Self::copy_mut(&mut inner, working_copy).ok_or_else(|| FileIoError::Get {
                working_copy: working_copy.clone(),
                location: location.to_string(),
                message: "unknown working copy".to_string(),
            })?;
        copy.files
            .get(location)
            .cloned()
            .ok_or_else(|| FileIoError::NotFound {
                working_copy: working_copy.clone(),
                location: location.to_string(),
            })
    }

    async fn put_file(
        &self,
        working_copy: &WorkingCopyId,
        location: &str,
        bytes: Vec<u8>,
    ) -> Result<(), FileIoError> {
        let mut inner = self.inner.lock();
        Self::record(&mut inner, format!("put_file {location}"));

        let copy =
            Self::copy_mut(&mut inner, working_copy).ok_or_else(|| FileIoError::Put {
                working_copy: working_copy.clone(),
                location: location.to_string(),
                message: "unknown working copy".to_string(),
            })?;
        copy.files.insert(location.to_string(), bytes);
        Ok(())
    }

    async fn delete_file(
        &self,
        working_copy: &WorkingCopyId,
        location: &str,
    ) -> Result<(), FileIoError> {
        let mut inner = self.inner.lock();
        Self::record(&mut inner, format!("delete_file {location}"));

        let copy =
            Self::copy_mut(&mut inner, working_copy).ok_or_else(|| FileIoError::Delete {
                working_copy: working_copy.clone(),
                location: location.to_string(),
                message: "unknown working copy".to_string(),
            })?;
        copy.files
            .remove(location)
            .map(|_| ())
            .ok_or_else(|| FileIoError::NotFound {
                working_copy: working_copy.clone(),
                location: location.to_string(),
            })
    }

    async fn collection_names(
        &self,
        working_copy: &WorkingCopyId,
    ) -> Result<Vec<String>, FileIoError> {
        let mut inner = self.inner.lock();
        Self::record(&mut inner, "collection_names".to_string());

        let copy =
            Self::copy_mut(&mut inner, working_copy).ok_or_else(|| FileIoError::Get {
                working_copy: working_copy.clone(),
                location: String::new(),
                message: "unknown working copy".to_string(),
            })?;
        Ok(copy.collections.keys().cloned().collect())
    }

    async fn load_collection(
        &self,
        working_copy: &WorkingCopyId,
        qualified_name: &str,
    ) -> Result<ImageCollection, LookupError> {
        let mut inner = self.inner.lock();
        Self::record(&mut inner, format!("load_collection {qualified_name}"));

        Self::copy_mut(&mut inner, working_copy)
            .and_then(|copy| copy.collections.get(qualified_name).cloned())
            .ok_or_else(|| LookupError::CollectionNotFound {
                qualified_name: qualified_name.to_string(),
            })
    }

    async fn delete_image(
        &self,
        working_copy: &WorkingCopyId,
        qualified_name: &str,
        name: &str,
    ) -> Result<(), LookupError> {
        let mut inner = self.inner.lock();
        Self::record(&mut inner, format!("delete_image {qualified_name}/{name}"));

        let collection = Self::copy_mut(&mut inner, working_copy)
            .and_then(|copy| copy.collections.get_mut(qualified_name))
            .ok_or_else(|| LookupError::CollectionNotFound {
                qualified_name: qualified_name.to_string(),
            })?;

        let before = collection.assets.len();
        collection.assets.retain(|a| a.name != name);
        if collection.assets.len() == before {
            return Err(LookupError::ImageNotFound {
                qualified_name: qualified_name.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    async fn create_image(
        &self,
        working_copy: &WorkingCopyId,
        qualified_name: &str,
        asset: ImageAsset,
    ) -> Result<(), LookupError> {
        let mut inner = self.inner.lock();
        Self::record(
            &mut inner,
            format!("create_image {qualified_name}/{}", asset.name),
        );

        let collection = Self::copy_mut(&mut inner, working_copy)
            .and_then(|copy| copy.collections.get_mut(qualified_name))
            .ok_or_else(|| LookupError::CollectionNotFound {
                qualified_name: qualified_name.to_string(),
            })?;
        collection.assets.push(asset);
        Ok(())
    }

    async fn flush_changes(&self, working_copy: &WorkingCopyId) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        Self::record(&mut inner, format!("flush_changes {working_copy}"));

        if inner.fail_flush {
            return Err(SessionError::Flush {
                working_copy: working_copy.clone(),
                message: "injected flush failure".to_string(),
            });
        }

        Self::copy_mut(&mut inner, working_copy)
            .map(|_| ())
            .ok_or_else(|| SessionError::Flush {
                working_copy: working_copy.clone(),
                message: "unknown working copy".to_string(),
            })
    }

    async fn export_package(
        &self,
        working_copy: &WorkingCopyId,
        dest: &Path,
    ) -> Result<(), SessionError> {
        let package = {
            let mut inner = self.inner.lock();
            Self::record(&mut inner, format!("export_package {working_copy}"));

            let copy =
                Self::copy_mut(&mut inner, working_copy).ok_or_else(|| SessionError::Export {
                    working_copy: working_copy.clone(),
                    message: "unknown working copy".to_string(),
                })?;
            ExportedPackage {
                app_id: copy.app_id.clone(),
                files: copy.files.clone(),
                collections: copy.collections.clone(),
            }
        };

        let bytes = serde_json::to_vec(&package).map_err(|e| SessionError::Export {
            working_copy: working_copy.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(dest, bytes).map_err(|e| SessionError::Export {
            working_copy: working_copy.clone(),
            message: e.to_string(),
        })
    }

    async fn delete_working_copy(&self, working_copy: &WorkingCopyId) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        Self::record(&mut inner, format!("delete_working_copy {working_copy}"));

        if inner.fail_cleanup {
            return Err(SessionError::Cleanup {
                working_copy: working_copy.clone(),
                message: "injected cleanup failure".to_string(),
            });
        }

        inner
            .copies
            .remove(working_copy)
            .map(|_| ())
            .ok_or_else(|| SessionError::Cleanup {
                working_copy: working_copy.clone(),
                message: "unknown working copy".to_string(),
            })
    }
}
