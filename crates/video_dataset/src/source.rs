//! Clip sources: in-memory sample sets and manifest-described frame folders.

use crate::types::{ClipSample, ClipShape, DatasetError, DatasetResult};
use data_contracts::{ClipManifest, ClipSplit, ImageModality};
use image::imageops::{self, FilterType};
use std::fs;
use std::path::{Path, PathBuf};

/// Random-access collection of labelled clips for one domain.
pub trait ClipDataset: Send + Sync {
    fn domain(&self) -> &str;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn shape(&self) -> ClipShape;
    fn num_classes(&self) -> usize;
    fn label(&self, index: usize) -> usize;
    fn split(&self, _index: usize) -> ClipSplit {
        ClipSplit::Train
    }
    fn load(&self, index: usize) -> DatasetResult<ClipSample>;
}

#[derive(Debug, Clone)]
pub struct InMemoryClips {
    domain: String,
    shape: ClipShape,
    num_classes: usize,
    samples: Vec<ClipSample>,
    splits: Vec<ClipSplit>,
}

impl InMemoryClips {
    pub fn new(
        domain: impl Into<String>,
        shape: ClipShape,
        num_classes: usize,
        samples: Vec<ClipSample>,
    ) -> DatasetResult<Self> {
        let splits = vec![ClipSplit::Train; samples.len()];
        Self::with_splits(domain, shape, num_classes, samples, splits)
    }

    pub fn with_splits(
        domain: impl Into<String>,
        shape: ClipShape,
        num_classes: usize,
        samples: Vec<ClipSample>,
        splits: Vec<ClipSplit>,
    ) -> DatasetResult<Self> {
        if splits.len() != samples.len() {
            return Err(DatasetError::BufferLength {
                expected: samples.len(),
                actual: splits.len(),
            });
        }
        for (index, sample) in samples.iter().enumerate() {
            if sample.label >= num_classes {
                return Err(DatasetError::Other(format!(
                    "clip {index}: label {} out of range for {num_classes} classes",
                    sample.label
                )));
            }
            if let Some(rgb) = &sample.rgb {
                if rgb.len() != shape.rgb_len() {
                    return Err(DatasetError::BufferLength {
                        expected: shape.rgb_len(),
                        actual: rgb.len(),
                    });
                }
            }
            if let Some(flow) = &sample.flow {
                if flow.len() != shape.flow_len() {
                    return Err(DatasetError::BufferLength {
                        expected: shape.flow_len(),
                        actual: flow.len(),
                    });
                }
            }
        }
        Ok(Self {
            domain: domain.into(),
            shape,
            num_classes,
            samples,
            splits,
        })
    }
}

impl ClipDataset for InMemoryClips {
    fn domain(&self) -> &str {
        &self.domain
    }

    fn len(&self) -> usize {
        self.samples.len()
    }

    fn shape(&self) -> ClipShape {
        self.shape
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn label(&self, index: usize) -> usize {
        self.samples[index].label
    }

    fn split(&self, index: usize) -> ClipSplit {
        self.splits[index]
    }

    fn load(&self, index: usize) -> DatasetResult<ClipSample> {
        self.samples
            .get(index)
            .cloned()
            .ok_or_else(|| DatasetError::Other(format!("clip index {index} out of range")))
    }
}

/// Clips stored as extracted frames on disk, indexed by a [`ClipManifest`].
///
/// RGB frames live directly in `rgb_dir`; flow frames live in `flow_dir/u` and
/// `flow_dir/v` as grayscale images. Frames are sampled evenly over the segment,
/// resized to the clip shape and mapped to [-1, 1].
#[derive(Debug, Clone)]
pub struct FrameFolderClips {
    root: PathBuf,
    manifest: ClipManifest,
    shape: ClipShape,
    modality: ImageModality,
}

impl FrameFolderClips {
    pub fn open(
        manifest_path: &Path,
        shape: ClipShape,
        modality: ImageModality,
    ) -> DatasetResult<Self> {
        let manifest = ClipManifest::from_path(manifest_path)?;
        manifest.validate(modality)?;
        let root = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        tracing::debug!(
            domain = %manifest.domain,
            clips = manifest.clips.len(),
            "opened clip manifest {}",
            manifest_path.display()
        );
        Ok(Self {
            root,
            manifest,
            shape,
            modality,
        })
    }

    pub fn manifest(&self) -> &ClipManifest {
        &self.manifest
    }
}

impl ClipDataset for FrameFolderClips {
    fn domain(&self) -> &str {
        &self.manifest.domain
    }

    fn len(&self) -> usize {
        self.manifest.clips.len()
    }

    fn shape(&self) -> ClipShape {
        self.shape
    }

    fn num_classes(&self) -> usize {
        self.manifest.num_classes
    }

    fn label(&self, index: usize) -> usize {
        self.manifest.clips[index].label
    }

    fn split(&self, index: usize) -> ClipSplit {
        self.manifest.clips[index].split
    }

    fn load(&self, index: usize) -> DatasetResult<ClipSample> {
        let entry = self
            .manifest
            .clips
            .get(index)
            .ok_or_else(|| DatasetError::Other(format!("clip index {index} out of range")))?;
        let rgb = match (self.modality.uses_rgb(), entry.rgb_dir.as_deref()) {
            (true, Some(dir)) => Some(load_rgb_frames(&self.root.join(dir), self.shape)?),
            (true, None) => {
                return Err(DatasetError::MissingStream {
                    index,
                    stream: "rgb",
                })
            }
            (false, _) => None,
        };
        let flow = match (self.modality.uses_flow(), entry.flow_dir.as_deref()) {
            (true, Some(dir)) => Some(load_flow_frames(&self.root.join(dir), self.shape)?),
            (true, None) => {
                return Err(DatasetError::MissingStream {
                    index,
                    stream: "flow",
                })
            }
            (false, _) => None,
        };
        Ok(ClipSample {
            rgb,
            flow,
            label: entry.label,
        })
    }
}

fn is_frame_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .as_deref(),
        Some("jpg" | "jpeg" | "png")
    )
}

/// Frame files in `dir`, sorted by file name.
pub fn list_frames(dir: &Path) -> DatasetResult<Vec<PathBuf>> {
    let read = fs::read_dir(dir).map_err(|source| DatasetError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut frames = Vec::new();
    for entry in read {
        let entry = entry.map_err(|source| DatasetError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if is_frame_file(&path) {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

/// Evenly spaced frame positions covering `available` frames.
pub fn sample_frame_indices(
    dir: &Path,
    available: usize,
    needed: usize,
) -> DatasetResult<Vec<usize>> {
    if available < needed || needed == 0 {
        return Err(DatasetError::FrameShortage {
            dir: dir.to_path_buf(),
            found: available,
            needed,
        });
    }
    Ok((0..needed).map(|i| i * available / needed).collect())
}

fn open_frame(path: &Path) -> DatasetResult<image::DynamicImage> {
    image::open(path).map_err(|source| DatasetError::Image {
        path: path.to_path_buf(),
        source,
    })
}

fn to_signed_unit(v: u8) -> f32 {
    v as f32 / 255.0 * 2.0 - 1.0
}

fn load_rgb_frames(dir: &Path, shape: ClipShape) -> DatasetResult<Vec<f32>> {
    let frames = list_frames(dir)?;
    let picks = sample_frame_indices(dir, frames.len(), shape.frames)?;
    let (w, h) = (shape.width as u32, shape.height as u32);
    let plane = shape.height * shape.width;
    let mut buf = vec![0.0f32; shape.rgb_len()];
    for (t, &pick) in picks.iter().enumerate() {
        let mut img = open_frame(&frames[pick])?.to_rgb8();
        if img.dimensions() != (w, h) {
            img = imageops::resize(&img, w, h, FilterType::Triangle);
        }
        for (x, y, px) in img.enumerate_pixels() {
            let offset = t * plane + y as usize * shape.width + x as usize;
            for c in 0..3 {
                buf[c * shape.volume() + offset] = to_signed_unit(px[c]);
            }
        }
    }
    Ok(buf)
}

fn load_flow_frames(dir: &Path, shape: ClipShape) -> DatasetResult<Vec<f32>> {
    let u_frames = list_frames(&dir.join("u"))?;
    let v_frames = list_frames(&dir.join("v"))?;
    let available = u_frames.len().min(v_frames.len());
    let picks = sample_frame_indices(dir, available, shape.frames)?;
    let (w, h) = (shape.width as u32, shape.height as u32);
    let plane = shape.height * shape.width;
    let mut buf = vec![0.0f32; shape.flow_len()];
    for (c, frames) in [&u_frames, &v_frames].into_iter().enumerate() {
        for (t, &pick) in picks.iter().enumerate() {
            let mut img = open_frame(&frames[pick])?.to_luma8();
            if img.dimensions() != (w, h) {
                img = imageops::resize(&img, w, h, FilterType::Triangle);
            }
            for (x, y, px) in img.enumerate_pixels() {
                let offset = t * plane + y as usize * shape.width + x as usize;
                buf[c * shape.volume() + offset] = to_signed_unit(px[0]);
            }
        }
    }
    Ok(buf)
}
