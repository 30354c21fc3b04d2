//! Core types and error definitions for video_dataset.

use data_contracts::ManifestError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{dir}: found {found} frames, need {needed}")]
    FrameShortage {
        dir: PathBuf,
        found: usize,
        needed: usize,
    },
    #[error("domain {domain} has no clips in the {split} split")]
    EmptySplit { domain: String, split: &'static str },
    #[error("source has {source_classes} classes but target has {target_classes}")]
    ClassMismatch {
        source_classes: usize,
        target_classes: usize,
    },
    #[error("clip shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: ClipShape,
        actual: ClipShape,
    },
    #[error("clip {index} is missing the {stream} stream")]
    MissingStream { index: usize, stream: &'static str },
    #[error("buffer length {actual} does not match expected {expected}")]
    BufferLength { expected: usize, actual: usize },
    #[error("{0}")]
    Other(String),
}

/// Spatiotemporal extent of every clip in a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipShape {
    pub frames: usize,
    pub height: usize,
    pub width: usize,
}

impl ClipShape {
    pub fn new(frames: usize, height: usize, width: usize) -> Self {
        Self {
            frames,
            height,
            width,
        }
    }

    pub fn volume(&self) -> usize {
        self.frames * self.height * self.width
    }

    pub fn rgb_len(&self) -> usize {
        3 * self.volume()
    }

    pub fn flow_len(&self) -> usize {
        2 * self.volume()
    }
}

#[derive(Debug, Clone)]
pub struct ClipSample {
    /// RGB clip in CTHW layout, values in [-1, 1].
    pub rgb: Option<Vec<f32>>,
    /// Flow clip (u, v) in CTHW layout, values in [-1, 1].
    pub flow: Option<Vec<f32>>,
    pub label: usize,
}
