//! Core types for the change-application pipeline.

pub mod asset;
pub mod change;
pub mod request;

pub use asset::{ImageAsset, ImageCollection};
pub use change::{ChangeDescriptor, ChangeType, ImageFormat, InvalidChange};
pub use request::{PipelineOutcome, PipelineRequest};
