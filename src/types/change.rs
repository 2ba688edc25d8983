//! Change descriptors: the declarative operations a pipeline run applies.

use serde::{Deserialize, Serialize};

/// Kind of change a descriptor requests.
///
/// The wire names (`CSS_Variable_Change`, `ImageCollection_Image_Change`)
/// are the external contract; anything else deserializes to `Unsupported`
/// and is skipped with a warning rather than silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    /// Rewrite a declared variable assignment inside a text resource.
    #[serde(rename = "CSS_Variable_Change")]
    TextVariable,
    /// Replace a named binary asset inside an image collection.
    #[serde(rename = "ImageCollection_Image_Change")]
    ImageCollectionImage,
    /// Any change type this pipeline does not understand.
    #[serde(other)]
    Unsupported,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TextVariable => write!(f, "CSS_Variable_Change"),
            Self::ImageCollectionImage => write!(f, "ImageCollection_Image_Change"),
            Self::Unsupported => write!(f, "Unsupported"),
        }
    }
}

/// Binary format of an image asset.
///
/// Unrecognized wire strings map to `Unknown`, never to an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    /// Windows bitmap.
    #[serde(rename = "BMP")]
    Bmp,
    /// GIF.
    #[serde(rename = "GIF")]
    Gif,
    /// JPEG.
    #[serde(rename = "JPG")]
    Jpg,
    /// PNG.
    #[serde(rename = "PNG")]
    Png,
    /// SVG.
    #[serde(rename = "SVG")]
    Svg,
    /// Unrecognized format.
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bmp => write!(f, "BMP"),
            Self::Gif => write!(f, "GIF"),
            Self::Jpg => write!(f, "JPG"),
            Self::Png => write!(f, "PNG"),
            Self::Svg => write!(f, "SVG"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A change is invalid when a field its type requires is empty.
#[derive(Debug, Clone, thiserror::Error)]
#[error("change of type {change_type} is missing required field `{field}`")]
pub struct InvalidChange {
    /// The declared change type.
    pub change_type: ChangeType,
    /// Wire name of the missing field.
    pub field: &'static str,
}

/// One declarative change against the model working copy.
///
/// Field usage depends on `change_type`: a `TextVariable` change reads
/// `location`/`item_name`/`new_value`, an `ImageCollectionImage` change reads
/// `location`/`item_name`/`object_name`/`format`. `validate` enforces that
/// split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDescriptor {
    /// Which mutator handles this change.
    #[serde(rename = "ChangeType")]
    pub change_type: ChangeType,
    /// Resource path or qualified collection name.
    #[serde(rename = "Location", default)]
    pub location: String,
    /// Variable name or asset name, depending on type.
    #[serde(rename = "ItemName", default)]
    pub item_name: String,
    /// Replacement value for a text variable change.
    #[serde(rename = "NewValue", default)]
    pub new_value: String,
    /// Artifact-store key holding the replacement bytes.
    #[serde(rename = "ObjectName", default)]
    pub object_name: String,
    /// Target format of the replacement image.
    #[serde(rename = "Format", default)]
    pub format: ImageFormat,
}

impl ChangeDescriptor {
    /// Build a text-variable change.
    pub fn text_variable(
        location: impl Into<String>,
        item_name: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            change_type: ChangeType::TextVariable,
            location: location.into(),
            item_name: item_name.into(),
            new_value: new_value.into(),
            object_name: String::new(),
            format: ImageFormat::Unknown,
        }
    }

    /// Build an image-collection change.
    pub fn image(
        location: impl Into<String>,
        item_name: impl Into<String>,
        object_name: impl Into<String>,
        format: ImageFormat,
    ) -> Self {
        Self {
            change_type: ChangeType::ImageCollectionImage,
            location: location.into(),
            item_name: item_name.into(),
            new_value: String::new(),
            object_name: object_name.into(),
            format,
        }
    }

    /// Check that every field the declared type requires is non-empty.
    ///
    /// `Unsupported` changes are vacuously valid; the dispatcher skips them
    /// before validation matters.
    pub fn validate(&self) -> Result<(), InvalidChange> {
        let missing = |field| InvalidChange {
            change_type: self.change_type,
            field,
        };

        match self.change_type {
            ChangeType::TextVariable => {
                if self.location.is_empty() {
                    return Err(missing("Location"));
                }
                if self.item_name.is_empty() {
                    return Err(missing("ItemName"));
                }
                if self.new_value.is_empty() {
                    return Err(missing("NewValue"));
                }
            }
            ChangeType::ImageCollectionImage => {
                if self.location.is_empty() {
                    return Err(missing("Location"));
                }
                if self.item_name.is_empty() {
                    return Err(missing("ItemName"));
                }
                if self.object_name.is_empty() {
                    return Err(missing("ObjectName"));
                }
            }
            ChangeType::Unsupported => {}
        }
        Ok(())
    }
}
