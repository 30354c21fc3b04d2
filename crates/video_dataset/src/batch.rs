//! Collation of clips into Burn tensors.

use crate::multi_domain::{MultiDomainDatasets, PairedIndices};
use crate::source::ClipDataset;
use crate::types::{ClipSample, ClipShape, DatasetError, DatasetResult};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use data_contracts::ImageModality;
use rayon::prelude::*;

/// Clips of one domain, `[N, C, T, H, W]` per stream.
#[derive(Debug, Clone)]
pub struct ModalBatch<B: Backend> {
    pub rgb: Option<Tensor<B, 5>>,
    pub flow: Option<Tensor<B, 5>>,
    pub labels: Tensor<B, 1, Int>,
}

impl<B: Backend> ModalBatch<B> {
    pub fn len(&self) -> usize {
        self.labels.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct DomainBatch<B: Backend> {
    pub source: ModalBatch<B>,
    pub target: ModalBatch<B>,
}

pub fn collate<B: Backend>(
    samples: &[ClipSample],
    shape: ClipShape,
    modality: ImageModality,
    device: &B::Device,
) -> DatasetResult<ModalBatch<B>> {
    if samples.is_empty() {
        return Err(DatasetError::Other("cannot collate empty batch".into()));
    }
    let n = samples.len();
    let dims = |channels: usize| [n, channels, shape.frames, shape.height, shape.width];

    let rgb = if modality.uses_rgb() {
        let mut buf = Vec::with_capacity(n * shape.rgb_len());
        for (index, sample) in samples.iter().enumerate() {
            let clip = sample
                .rgb
                .as_ref()
                .ok_or(DatasetError::MissingStream {
                    index,
                    stream: "rgb",
                })?;
            if clip.len() != shape.rgb_len() {
                return Err(DatasetError::BufferLength {
                    expected: shape.rgb_len(),
                    actual: clip.len(),
                });
            }
            buf.extend_from_slice(clip);
        }
        Some(Tensor::<B, 1>::from_floats(buf.as_slice(), device).reshape(dims(3)))
    } else {
        None
    };

    let flow = if modality.uses_flow() {
        let mut buf = Vec::with_capacity(n * shape.flow_len());
        for (index, sample) in samples.iter().enumerate() {
            let clip = sample
                .flow
                .as_ref()
                .ok_or(DatasetError::MissingStream {
                    index,
                    stream: "flow",
                })?;
            if clip.len() != shape.flow_len() {
                return Err(DatasetError::BufferLength {
                    expected: shape.flow_len(),
                    actual: clip.len(),
                });
            }
            buf.extend_from_slice(clip);
        }
        Some(Tensor::<B, 1>::from_floats(buf.as_slice(), device).reshape(dims(2)))
    } else {
        None
    };

    let labels: Vec<i64> = samples.iter().map(|s| s.label as i64).collect();
    let labels = Tensor::<B, 1, Int>::from_data(TensorData::new(labels, [n]), device);

    Ok(ModalBatch { rgb, flow, labels })
}

fn load_all(ds: &dyn ClipDataset, indices: &[usize]) -> DatasetResult<Vec<ClipSample>> {
    indices.par_iter().map(|&i| ds.load(i)).collect()
}

/// Load and collate both sides of a paired batch, reading clips in parallel.
pub fn load_pair<B: Backend>(
    data: &MultiDomainDatasets,
    pair: &PairedIndices,
    device: &B::Device,
) -> DatasetResult<DomainBatch<B>> {
    let (source, target) = rayon::join(
        || load_all(data.source(), &pair.source),
        || load_all(data.target(), &pair.target),
    );
    let (source, target) = (source?, target?);
    let shape = data.source().shape();
    Ok(DomainBatch {
        source: collate(&source, shape, data.modality(), device)?,
        target: collate(&target, shape, data.modality(), device)?,
    })
}
