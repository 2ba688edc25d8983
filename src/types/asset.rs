//! Model-side image collections and their assets.

use serde::{Deserialize, Serialize};

use super::change::ImageFormat;

/// A named binary asset inside an image collection.
///
/// An asset belongs to exactly one collection at a time. Replacing an asset
/// of the same name is delete-then-create, never an in-place update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    /// Asset name, unique within its collection.
    pub name: String,
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Declared binary format.
    pub format: ImageFormat,
}

impl ImageAsset {
    /// Create a new asset.
    pub fn new(name: impl Into<String>, data: Vec<u8>, format: ImageFormat) -> Self {
        Self {
            name: name.into(),
            data,
            format,
        }
    }
}

/// A named container of image assets inside the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCollection {
    /// Fully qualified collection name (e.g. `MyModule.Images`).
    pub qualified_name: String,
    /// Assets currently in the collection.
    pub assets: Vec<ImageAsset>,
}

impl ImageCollection {
    /// Create an empty collection.
    pub fn new(qualified_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            assets: Vec::new(),
        }
    }

    /// Create a collection with initial assets.
    pub fn with_assets(qualified_name: impl Into<String>, assets: Vec<ImageAsset>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            assets,
        }
    }

    /// Find an asset by exact name.
    pub fn asset(&self, name: &str) -> Option<&ImageAsset> {
        self.assets.iter().find(|a| a.name == name)
    }

    /// Number of assets with the given name (at most one in a well-formed
    /// collection; tests use this to assert replace semantics).
    pub fn count_named(&self, name: &str) -> usize {
        self.assets.iter().filter(|a| a.name == name).count()
    }
}
