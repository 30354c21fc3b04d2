//! Shared data contracts for clip manifests and stream modalities.

pub mod manifest;
pub mod modality;

pub use manifest::{ClipEntry, ClipManifest, ClipSplit, ManifestError};
pub use modality::{ImageModality, ParseModalityError};
