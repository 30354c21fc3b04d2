//! PyTorch `state_dict` checkpoints, such as the published I3D `.pt` files, read with
//! candle's pickle reader and copied into Burn parameters key by key.

use crate::error::{ModelError, ModelResult};
use burn::module::{Param, RunningState};
use burn::nn::conv::Conv3d;
use burn::nn::BatchNorm;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use candle_core::DType;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

struct HostTensor {
    shape: Vec<usize>,
    values: Vec<f32>,
}

/// Host copy of every tensor in a checkpoint, keyed by its `state_dict` name.
/// Layers take their tensors out as they load; whatever is left was not used.
pub struct TorchStateDict {
    path: PathBuf,
    tensors: HashMap<String, HostTensor>,
}

impl TorchStateDict {
    pub fn open(path: &Path) -> ModelResult<Self> {
        let err = |e: candle_core::Error| ModelError::Record {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        let mut tensors = HashMap::new();
        for (name, tensor) in candle_core::pickle::read_all(path).map_err(err)? {
            let shape = tensor.dims().to_vec();
            let values = tensor
                .to_dtype(DType::F32)
                .and_then(|t| t.flatten_all())
                .and_then(|t| t.to_vec1::<f32>())
                .map_err(err)?;
            // Checkpoints saved from `nn.DataParallel` prefix every key.
            let name = name.strip_prefix("module.").unwrap_or(&name).to_string();
            tensors.insert(name, HostTensor { shape, values });
        }
        tracing::debug!(tensors = tensors.len(), "read {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            tensors,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn shape(&self, key: &str) -> Option<&[usize]> {
        self.tensors.get(key).map(|t| t.shape.as_slice())
    }

    /// Remove `key`, which must hold a tensor of exactly `shape`.
    pub fn take<B: Backend, const D: usize>(
        &mut self,
        key: &str,
        shape: [usize; D],
        device: &B::Device,
    ) -> ModelResult<Tensor<B, D>> {
        let tensor = self
            .tensors
            .remove(key)
            .ok_or_else(|| ModelError::MissingWeight {
                path: self.path.clone(),
                key: key.to_string(),
            })?;
        if tensor.shape != shape {
            return Err(ModelError::WeightShape {
                key: key.to_string(),
                expected: shape.to_vec(),
                actual: tensor.shape,
            });
        }
        Ok(Tensor::from_data(TensorData::new(tensor.values, shape), device))
    }

    /// Drop a bookkeeping entry that has no Burn counterpart.
    pub fn discard(&mut self, key: &str) {
        self.tensors.remove(key);
    }

    /// Keys no layer has taken, sorted.
    pub fn remaining(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.tensors.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

/// `{prefix}.weight` and, when the layer has one, `{prefix}.bias`.
pub(crate) fn load_conv3d<B: Backend>(
    mut conv: Conv3d<B>,
    prefix: &str,
    dict: &mut TorchStateDict,
    device: &B::Device,
) -> ModelResult<Conv3d<B>> {
    let weight = dict.take(&format!("{prefix}.weight"), conv.weight.dims(), device)?;
    conv.weight = Param::from_tensor(weight);
    if let Some(bias) = conv.bias.take() {
        let bias = dict.take(&format!("{prefix}.bias"), bias.dims(), device)?;
        conv.bias = Some(Param::from_tensor(bias));
    }
    Ok(conv)
}

/// PyTorch names the affine pair `weight`/`bias`; Burn calls them `gamma`/`beta`.
pub(crate) fn load_batch_norm<B: Backend>(
    mut bn: BatchNorm<B, 3>,
    prefix: &str,
    dict: &mut TorchStateDict,
    device: &B::Device,
) -> ModelResult<BatchNorm<B, 3>> {
    let shape = bn.gamma.dims();
    bn.gamma = Param::from_tensor(dict.take(&format!("{prefix}.weight"), shape, device)?);
    bn.beta = Param::from_tensor(dict.take(&format!("{prefix}.bias"), shape, device)?);
    bn.running_mean = RunningState::new(dict.take(&format!("{prefix}.running_mean"), shape, device)?);
    bn.running_var = RunningState::new(dict.take(&format!("{prefix}.running_var"), shape, device)?);
    dict.discard(&format!("{prefix}.num_batches_tracked"));
    Ok(bn)
}
