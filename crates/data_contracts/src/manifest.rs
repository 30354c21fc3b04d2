use crate::modality::ImageModality;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClipSplit {
    #[default]
    Train,
    Test,
}

/// One labelled action segment. Frame directories are relative to the manifest root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipEntry {
    #[serde(default)]
    pub rgb_dir: Option<String>,
    /// Directory holding `u/` and `v/` flow frames.
    #[serde(default)]
    pub flow_dir: Option<String>,
    pub label: usize,
    #[serde(default)]
    pub split: ClipSplit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipManifest {
    /// Domain name, e.g. `D1` or `ucf`.
    pub domain: String,
    pub num_classes: usize,
    pub clips: Vec<ClipEntry>,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest declares zero classes")]
    NoClasses,
    #[error("clip {index}: label {label} out of range for {num_classes} classes")]
    LabelOutOfRange {
        index: usize,
        label: usize,
        num_classes: usize,
    },
    #[error("clip {index}: missing {stream} directory required by modality {modality}")]
    MissingStream {
        index: usize,
        stream: &'static str,
        modality: ImageModality,
    },
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse manifest {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ClipManifest {
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let raw = std::fs::read(path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| ManifestError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self, modality: ImageModality) -> Result<(), ManifestError> {
        if self.num_classes == 0 {
            return Err(ManifestError::NoClasses);
        }
        for (index, clip) in self.clips.iter().enumerate() {
            if clip.label >= self.num_classes {
                return Err(ManifestError::LabelOutOfRange {
                    index,
                    label: clip.label,
                    num_classes: self.num_classes,
                });
            }
            if modality.uses_rgb() && clip.rgb_dir.as_deref().map_or(true, str::is_empty) {
                return Err(ManifestError::MissingStream {
                    index,
                    stream: "rgb",
                    modality,
                });
            }
            if modality.uses_flow() && clip.flow_dir.as_deref().map_or(true, str::is_empty) {
                return Err(ManifestError::MissingStream {
                    index,
                    stream: "flow",
                    modality,
                });
            }
        }
        Ok(())
    }

    pub fn count_split(&self, split: ClipSplit) -> usize {
        self.clips.iter().filter(|c| c.split == split).count()
    }
}
