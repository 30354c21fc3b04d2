//! Inflated 3D Inception network (I3D).
//!
//! Convolutions and pools use TensorFlow-style "same" padding computed from the input
//! size at run time, so any clip size works. The network can be truncated at any
//! [`Endpoint`]; layers past it are never allocated.

use crate::error::{ModelError, ModelResult};
use crate::torch_weights::{load_batch_norm, load_conv3d, TorchStateDict};
use burn::module::Module;
use burn::nn::conv::{Conv3d, Conv3dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Dropout, DropoutConfig};
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::module::max_pool2d;
use burn::tensor::Tensor;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Total padding needed along one axis so that `out = ceil(len / stride)`.
pub fn compute_pad(kernel: usize, stride: usize, len: usize) -> usize {
    let stride = stride.max(1);
    if len % stride == 0 {
        kernel.saturating_sub(stride)
    } else {
        kernel.saturating_sub(len % stride)
    }
}

fn pad_axis<B: Backend>(x: Tensor<B, 5>, axis: usize, front: usize, back: usize) -> Tensor<B, 5> {
    let device = x.device();
    let dims = x.dims();
    let zeros = |n: usize| {
        let mut shape = dims;
        shape[axis] = n;
        Tensor::<B, 5>::zeros(shape, &device)
    };
    let mut parts = Vec::with_capacity(3);
    if front > 0 {
        parts.push(zeros(front));
    }
    parts.push(x);
    if back > 0 {
        parts.push(zeros(back));
    }
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        Tensor::cat(parts, axis)
    }
}

/// Zero-pad `[N, C, T, H, W]` for a "same" window; the back side takes the odd pixel.
fn pad_same<B: Backend>(x: Tensor<B, 5>, kernel: [usize; 3], stride: [usize; 3]) -> Tensor<B, 5> {
    let [_, _, t, h, w] = x.dims();
    let mut x = x;
    for (i, len) in [t, h, w].into_iter().enumerate() {
        let pad = compute_pad(kernel[i], stride[i], len);
        if pad > 0 {
            let front = pad / 2;
            x = pad_axis(x, i + 2, front, pad - front);
        }
    }
    x
}

#[derive(Debug, Clone)]
pub struct Unit3dConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel: [usize; 3],
    pub stride: [usize; 3],
    pub batch_norm: bool,
    pub bias: bool,
    pub activation: bool,
}

impl Unit3dConfig {
    pub fn new(in_channels: usize, out_channels: usize) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel: [1, 1, 1],
            stride: [1, 1, 1],
            batch_norm: true,
            bias: false,
            activation: true,
        }
    }

    pub fn with_kernel(mut self, kernel: [usize; 3]) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_stride(mut self, stride: [usize; 3]) -> Self {
        self.stride = stride;
        self
    }

    /// Plain biased convolution: no batch norm, no activation (the logits layer).
    pub fn linear(mut self) -> Self {
        self.batch_norm = false;
        self.bias = true;
        self.activation = false;
        self
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Unit3d<B> {
        let conv3d = Conv3dConfig::new([self.in_channels, self.out_channels], self.kernel)
            .with_stride(self.stride)
            .with_bias(self.bias)
            .init(device);
        let bn = self.batch_norm.then(|| {
            BatchNormConfig::new(self.out_channels)
                .with_epsilon(1e-3)
                .with_momentum(0.01)
                .init(device)
        });
        Unit3d {
            conv3d,
            bn,
            kernel: self.kernel,
            stride: self.stride,
            activation: self.activation,
        }
    }
}

/// Conv3d with dynamic same padding, optional batch norm and ReLU.
#[derive(Module, Debug)]
pub struct Unit3d<B: Backend> {
    conv3d: Conv3d<B>,
    bn: Option<BatchNorm<B, 3>>,
    kernel: [usize; 3],
    stride: [usize; 3],
    activation: bool,
}

impl<B: Backend> Unit3d<B> {
    fn load_state_dict(
        mut self,
        prefix: &str,
        dict: &mut TorchStateDict,
        device: &B::Device,
    ) -> ModelResult<Self> {
        self.conv3d = load_conv3d(self.conv3d, &format!("{prefix}.conv3d"), dict, device)?;
        if let Some(bn) = self.bn.take() {
            self.bn = Some(load_batch_norm(bn, &format!("{prefix}.bn"), dict, device)?);
        }
        Ok(self)
    }

    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let x = pad_same(x, self.kernel, self.stride);
        let mut x = self.conv3d.forward(x);
        if let Some(bn) = &self.bn {
            x = bn.forward(x);
        }
        if self.activation {
            x = relu(x);
        }
        x
    }
}

/// Max pool with same padding, evaluated as a spatial 2D pool per frame followed by a
/// temporal pool.
#[derive(Module, Clone, Debug)]
pub struct MaxPool3dSame {
    kernel: [usize; 3],
    stride: [usize; 3],
}

impl MaxPool3dSame {
    pub fn new(kernel: [usize; 3], stride: [usize; 3]) -> Self {
        Self { kernel, stride }
    }

    pub fn forward<B: Backend>(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let [kt, kh, kw] = self.kernel;
        let [st, sh, sw] = self.stride;
        let x = pad_same(x, self.kernel, self.stride);
        let [n, c, t, h, w] = x.dims();

        let x = x.swap_dims(1, 2).reshape([n * t, c, h, w]);
        let x = max_pool2d(x, [kh, kw], [sh, sw], [0, 0], [1, 1]);
        let [_, _, h2, w2] = x.dims();
        let x = x.reshape([n, t, c, h2, w2]).swap_dims(1, 2);
        if kt == 1 && st == 1 {
            return x;
        }

        let x = x.reshape([n, c, t, h2 * w2]);
        let x = max_pool2d(x, [kt, 1], [st, 1], [0, 0], [1, 1]);
        let [_, _, t2, _] = x.dims();
        x.reshape([n, c, t2, h2, w2])
    }
}

/// Four parallel branches concatenated on channels:
/// 1x1x1; 1x1x1 then 3x3x3; 1x1x1 then 3x3x3; 3x3x3 max pool then 1x1x1.
#[derive(Module, Debug)]
pub struct InceptionModule<B: Backend> {
    b0: Unit3d<B>,
    b1a: Unit3d<B>,
    b1b: Unit3d<B>,
    b2a: Unit3d<B>,
    b2b: Unit3d<B>,
    b3a: MaxPool3dSame,
    b3b: Unit3d<B>,
}

impl<B: Backend> InceptionModule<B> {
    pub fn new(in_channels: usize, out: [usize; 6], device: &B::Device) -> Self {
        Self {
            b0: Unit3dConfig::new(in_channels, out[0]).init(device),
            b1a: Unit3dConfig::new(in_channels, out[1]).init(device),
            b1b: Unit3dConfig::new(out[1], out[2])
                .with_kernel([3, 3, 3])
                .init(device),
            b2a: Unit3dConfig::new(in_channels, out[3]).init(device),
            b2b: Unit3dConfig::new(out[3], out[4])
                .with_kernel([3, 3, 3])
                .init(device),
            b3a: MaxPool3dSame::new([3, 3, 3], [1, 1, 1]),
            b3b: Unit3dConfig::new(in_channels, out[5]).init(device),
        }
    }

    fn load_state_dict(
        self,
        prefix: &str,
        dict: &mut TorchStateDict,
        device: &B::Device,
    ) -> ModelResult<Self> {
        let mut load = |unit: Unit3d<B>, branch: &str| {
            unit.load_state_dict(&format!("{prefix}.{branch}"), dict, device)
        };
        Ok(Self {
            b0: load(self.b0, "b0")?,
            b1a: load(self.b1a, "b1a")?,
            b1b: load(self.b1b, "b1b")?,
            b2a: load(self.b2a, "b2a")?,
            b2b: load(self.b2b, "b2b")?,
            b3a: self.b3a,
            b3b: load(self.b3b, "b3b")?,
        })
    }

    pub fn out_channels(out: [usize; 6]) -> usize {
        out[0] + out[2] + out[4] + out[5]
    }

    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let b0 = self.b0.forward(x.clone());
        let b1 = self.b1b.forward(self.b1a.forward(x.clone()));
        let b2 = self.b2b.forward(self.b2a.forward(x.clone()));
        let b3 = self.b3b.forward(self.b3a.forward(x));
        Tensor::cat(vec![b0, b1, b2, b3], 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Endpoint {
    Conv3d1a7x7,
    MaxPool3d2a3x3,
    Conv3d2b1x1,
    Conv3d2c3x3,
    MaxPool3d3a3x3,
    Mixed3b,
    Mixed3c,
    MaxPool3d4a3x3,
    Mixed4b,
    Mixed4c,
    Mixed4d,
    Mixed4e,
    Mixed4f,
    MaxPool3d5a2x2,
    Mixed5b,
    Mixed5c,
    Logits,
    Predictions,
}

impl Endpoint {
    pub const ALL: [Endpoint; 18] = [
        Endpoint::Conv3d1a7x7,
        Endpoint::MaxPool3d2a3x3,
        Endpoint::Conv3d2b1x1,
        Endpoint::Conv3d2c3x3,
        Endpoint::MaxPool3d3a3x3,
        Endpoint::Mixed3b,
        Endpoint::Mixed3c,
        Endpoint::MaxPool3d4a3x3,
        Endpoint::Mixed4b,
        Endpoint::Mixed4c,
        Endpoint::Mixed4d,
        Endpoint::Mixed4e,
        Endpoint::Mixed4f,
        Endpoint::MaxPool3d5a2x2,
        Endpoint::Mixed5b,
        Endpoint::Mixed5c,
        Endpoint::Logits,
        Endpoint::Predictions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Conv3d1a7x7 => "Conv3d_1a_7x7",
            Endpoint::MaxPool3d2a3x3 => "MaxPool3d_2a_3x3",
            Endpoint::Conv3d2b1x1 => "Conv3d_2b_1x1",
            Endpoint::Conv3d2c3x3 => "Conv3d_2c_3x3",
            Endpoint::MaxPool3d3a3x3 => "MaxPool3d_3a_3x3",
            Endpoint::Mixed3b => "Mixed_3b",
            Endpoint::Mixed3c => "Mixed_3c",
            Endpoint::MaxPool3d4a3x3 => "MaxPool3d_4a_3x3",
            Endpoint::Mixed4b => "Mixed_4b",
            Endpoint::Mixed4c => "Mixed_4c",
            Endpoint::Mixed4d => "Mixed_4d",
            Endpoint::Mixed4e => "Mixed_4e",
            Endpoint::Mixed4f => "Mixed_4f",
            Endpoint::MaxPool3d5a2x2 => "MaxPool3d_5a_2x2",
            Endpoint::Mixed5b => "Mixed_5b",
            Endpoint::Mixed5c => "Mixed_5c",
            Endpoint::Logits => "Logits",
            Endpoint::Predictions => "Predictions",
        }
    }

    /// Channels of the feature map produced at this endpoint.
    pub fn out_channels(self) -> usize {
        match self {
            Endpoint::Conv3d1a7x7 | Endpoint::MaxPool3d2a3x3 | Endpoint::Conv3d2b1x1 => 64,
            Endpoint::Conv3d2c3x3 | Endpoint::MaxPool3d3a3x3 => 192,
            Endpoint::Mixed3b => 256,
            Endpoint::Mixed3c | Endpoint::MaxPool3d4a3x3 => 480,
            Endpoint::Mixed4b | Endpoint::Mixed4c | Endpoint::Mixed4d => 512,
            Endpoint::Mixed4e => 528,
            Endpoint::Mixed4f | Endpoint::MaxPool3d5a2x2 | Endpoint::Mixed5b => 832,
            Endpoint::Mixed5c | Endpoint::Logits | Endpoint::Predictions => 1024,
        }
    }

    fn has_logits(self) -> bool {
        self >= Endpoint::Logits
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Endpoint {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Endpoint::ALL
            .into_iter()
            .find(|e| e.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ModelError::UnknownEndpoint(s.to_string()))
    }
}

/// One stage of the trunk: exactly one of the three layer kinds is set.
#[derive(Module, Debug)]
pub struct I3dStage<B: Backend> {
    unit: Option<Unit3d<B>>,
    pool: Option<MaxPool3dSame>,
    mixed: Option<InceptionModule<B>>,
}

impl<B: Backend> I3dStage<B> {
    fn unit(unit: Unit3d<B>) -> Self {
        Self {
            unit: Some(unit),
            pool: None,
            mixed: None,
        }
    }

    fn pool(kernel: [usize; 3], stride: [usize; 3]) -> Self {
        Self {
            unit: None,
            pool: Some(MaxPool3dSame::new(kernel, stride)),
            mixed: None,
        }
    }

    fn mixed(in_channels: usize, out: [usize; 6], device: &B::Device) -> Self {
        Self {
            unit: None,
            pool: None,
            mixed: Some(InceptionModule::new(in_channels, out, device)),
        }
    }

    /// Pools carry no parameters; units and inception blocks load under `prefix`.
    fn load_state_dict(
        mut self,
        prefix: &str,
        dict: &mut TorchStateDict,
        device: &B::Device,
    ) -> ModelResult<Self> {
        if let Some(unit) = self.unit.take() {
            self.unit = Some(unit.load_state_dict(prefix, dict, device)?);
        }
        if let Some(mixed) = self.mixed.take() {
            self.mixed = Some(mixed.load_state_dict(prefix, dict, device)?);
        }
        Ok(self)
    }

    fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        if let Some(unit) = &self.unit {
            unit.forward(x)
        } else if let Some(pool) = &self.pool {
            pool.forward(x)
        } else if let Some(mixed) = &self.mixed {
            mixed.forward(x)
        } else {
            x
        }
    }
}

#[derive(Debug, Clone)]
pub struct InceptionI3dConfig {
    pub in_channels: usize,
    pub num_classes: usize,
    pub final_endpoint: Endpoint,
    pub dropout_keep_prob: f64,
}

impl Default for InceptionI3dConfig {
    fn default() -> Self {
        Self {
            in_channels: 3,
            num_classes: 400,
            final_endpoint: Endpoint::Logits,
            dropout_keep_prob: 0.5,
        }
    }
}

impl InceptionI3dConfig {
    pub fn with_in_channels(mut self, in_channels: usize) -> Self {
        self.in_channels = in_channels;
        self
    }

    pub fn with_final_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.final_endpoint = endpoint;
        self
    }

    pub fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = num_classes;
        self
    }
}

#[derive(Module, Debug)]
pub struct InceptionI3d<B: Backend> {
    stages: Vec<I3dStage<B>>,
    dropout: Option<Dropout>,
    logits: Option<Unit3d<B>>,
    feature_dim: usize,
    num_classes: usize,
}

impl<B: Backend> InceptionI3d<B> {
    pub fn new(cfg: &InceptionI3dConfig, device: &B::Device) -> Self {
        let mut stages = Vec::new();
        for endpoint in Endpoint::ALL {
            if endpoint > cfg.final_endpoint {
                break;
            }
            if let Some(stage) = Self::stage(endpoint, cfg.in_channels, device) {
                stages.push(stage);
            }
        }
        let feature_dim = cfg.final_endpoint.out_channels();
        let (dropout, logits) = if cfg.final_endpoint.has_logits() {
            (
                Some(DropoutConfig::new(1.0 - cfg.dropout_keep_prob).init()),
                Some(Self::logits_unit(feature_dim, cfg.num_classes, device)),
            )
        } else {
            (None, None)
        };
        Self {
            stages,
            dropout,
            logits,
            feature_dim,
            num_classes: cfg.num_classes,
        }
    }

    /// Trunk layer for `endpoint`; the logits endpoints have none.
    fn stage(endpoint: Endpoint, in_channels: usize, device: &B::Device) -> Option<I3dStage<B>> {
        let mixed = |cin: usize, out: [usize; 6]| I3dStage::mixed(cin, out, device);
        let stage = match endpoint {
            Endpoint::Conv3d1a7x7 => I3dStage::unit(
                Unit3dConfig::new(in_channels, 64)
                    .with_kernel([7, 7, 7])
                    .with_stride([2, 2, 2])
                    .init(device),
            ),
            Endpoint::MaxPool3d2a3x3 | Endpoint::MaxPool3d3a3x3 => {
                I3dStage::pool([1, 3, 3], [1, 2, 2])
            }
            Endpoint::Conv3d2b1x1 => I3dStage::unit(Unit3dConfig::new(64, 64).init(device)),
            Endpoint::Conv3d2c3x3 => I3dStage::unit(
                Unit3dConfig::new(64, 192)
                    .with_kernel([3, 3, 3])
                    .init(device),
            ),
            Endpoint::Mixed3b => mixed(192, [64, 96, 128, 16, 32, 32]),
            Endpoint::Mixed3c => mixed(256, [128, 128, 192, 32, 96, 64]),
            Endpoint::MaxPool3d4a3x3 => I3dStage::pool([3, 3, 3], [2, 2, 2]),
            Endpoint::Mixed4b => mixed(480, [192, 96, 208, 16, 48, 64]),
            Endpoint::Mixed4c => mixed(512, [160, 112, 224, 24, 64, 64]),
            Endpoint::Mixed4d => mixed(512, [128, 128, 256, 24, 64, 64]),
            Endpoint::Mixed4e => mixed(512, [112, 144, 288, 32, 64, 64]),
            Endpoint::Mixed4f => mixed(528, [256, 160, 320, 32, 128, 128]),
            Endpoint::MaxPool3d5a2x2 => I3dStage::pool([2, 2, 2], [2, 2, 2]),
            Endpoint::Mixed5b => mixed(832, [256, 160, 320, 32, 128, 128]),
            Endpoint::Mixed5c => mixed(832, [384, 192, 384, 48, 128, 128]),
            Endpoint::Logits | Endpoint::Predictions => return None,
        };
        Some(stage)
    }

    fn logits_unit(in_channels: usize, num_classes: usize, device: &B::Device) -> Unit3d<B> {
        Unit3dConfig::new(in_channels, num_classes)
            .linear()
            .init(device)
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn trunk(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        self.stages.iter().fold(x, |x, stage| stage.forward(x))
    }

    /// Globally average-pooled trunk output, `[N, feature_dim]`.
    pub fn forward_features(&self, x: Tensor<B, 5>) -> Tensor<B, 2> {
        let x = self.trunk(x);
        let [n, c, _, _, _] = x.dims();
        x.mean_dim(2).mean_dim(3).mean_dim(4).reshape([n, c])
    }

    /// Class scores `[N, num_classes]`, spatially squeezed.
    pub fn forward_logits(&self, x: Tensor<B, 5>) -> ModelResult<Tensor<B, 2>> {
        let (Some(dropout), Some(logits)) = (&self.dropout, &self.logits) else {
            return Err(ModelError::NoLogits {
                built: self.final_endpoint_name(),
            });
        };
        let x = self.trunk(x);
        let x = x.mean_dim(2).mean_dim(3).mean_dim(4);
        let x = logits.forward(dropout.forward(x));
        let [n, k, _, _, _] = x.dims();
        Ok(x.reshape([n, k]))
    }

    fn final_endpoint_name(&self) -> &'static str {
        Endpoint::ALL
            .get(self.stages.len().saturating_sub(1))
            .map(|e| e.name())
            .unwrap_or("none")
    }

    /// Swap in a freshly initialised logits layer for `num_classes` classes.
    pub fn replace_logits(mut self, num_classes: usize, device: &B::Device) -> ModelResult<Self> {
        if self.logits.is_none() {
            return Err(ModelError::NoLogits {
                built: self.final_endpoint_name(),
            });
        }
        self.logits = Some(Self::logits_unit(self.feature_dim, num_classes, device));
        self.num_classes = num_classes;
        Ok(self)
    }

    /// Load weights from `path`: a PyTorch `state_dict` (`.pt`/`.pth`, the published
    /// I3D checkpoints) or a record written by `save_file` for the same architecture.
    pub fn load_pretrained(self, path: &Path, device: &B::Device) -> ModelResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("pt") | Some("pth") => {
                let mut dict = TorchStateDict::open(path)?;
                let net = self.load_state_dict(&mut dict, device)?;
                tracing::debug!(
                    unused = dict.len(),
                    "loaded PyTorch I3D weights from {}",
                    path.display()
                );
                Ok(net)
            }
            _ => {
                let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
                self.load_file(path.to_path_buf(), &recorder, device)
                    .map_err(|e| ModelError::Record {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })
            }
        }
    }

    /// Copy the built stages from a PyTorch I3D `state_dict`, whose keys are
    /// `<Endpoint>.<branch>.conv3d.weight` and so on. Stages past the final endpoint are
    /// left in `dict`. The logits layer loads only when its class count matches the
    /// checkpoint; otherwise it keeps its fresh initialisation.
    pub fn load_state_dict(
        self,
        dict: &mut TorchStateDict,
        device: &B::Device,
    ) -> ModelResult<Self> {
        let Self {
            stages,
            dropout,
            logits,
            feature_dim,
            num_classes,
        } = self;
        let stages = stages
            .into_iter()
            .zip(Endpoint::ALL)
            .map(|(stage, endpoint)| stage.load_state_dict(endpoint.name(), dict, device))
            .collect::<ModelResult<Vec<_>>>()?;
        let logits = match logits {
            Some(unit) => {
                let expected = unit.conv3d.weight.dims();
                let found = dict.shape("logits.conv3d.weight").map(<[usize]>::to_vec);
                if found.as_deref() == Some(expected.as_slice()) {
                    Some(unit.load_state_dict("logits", dict, device)?)
                } else {
                    tracing::warn!(
                        ?found,
                        num_classes,
                        "checkpoint logits do not match; keeping a fresh logits layer"
                    );
                    Some(unit)
                }
            }
            None => None,
        };
        Ok(Self {
            stages,
            dropout,
            logits,
            feature_dim,
            num_classes,
        })
    }
}

/// Published I3D weight sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PretrainedWeights {
    RgbImagenet,
    FlowImagenet,
    RgbCharades,
    FlowCharades,
}

impl PretrainedWeights {
    pub fn name(self) -> &'static str {
        match self {
            PretrainedWeights::RgbImagenet => "rgb_imagenet",
            PretrainedWeights::FlowImagenet => "flow_imagenet",
            PretrainedWeights::RgbCharades => "rgb_charades",
            PretrainedWeights::FlowCharades => "flow_charades",
        }
    }

    pub fn in_channels(self) -> usize {
        match self {
            PretrainedWeights::RgbImagenet | PretrainedWeights::RgbCharades => 3,
            PretrainedWeights::FlowImagenet | PretrainedWeights::FlowCharades => 2,
        }
    }

    pub fn url(self) -> &'static str {
        match self {
            PretrainedWeights::RgbImagenet => {
                "https://github.com/XianyuanLiu/pytorch-i3d/raw/master/models/rgb_imagenet.pt"
            }
            PretrainedWeights::FlowImagenet => {
                "https://github.com/XianyuanLiu/pytorch-i3d/raw/master/models/flow_imagenet.pt"
            }
            PretrainedWeights::RgbCharades => {
                "https://github.com/XianyuanLiu/pytorch-i3d/raw/master/models/rgb_charades.pt"
            }
            PretrainedWeights::FlowCharades => {
                "https://github.com/XianyuanLiu/pytorch-i3d/raw/master/models/flow_charades.pt"
            }
        }
    }

    /// Checkpoint path under `dir`, named as published (`<name>.pt`).
    pub fn path_in(self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.pt", self.name()))
    }

    /// The cached checkpoint under `dir`: the published `.pt`, else a converted
    /// `<name>.bin` record.
    pub fn locate(self, dir: &Path) -> ModelResult<PathBuf> {
        let published = self.path_in(dir);
        if published.is_file() {
            return Ok(published);
        }
        let record = dir.join(format!("{}.bin", self.name()));
        if record.is_file() {
            return Ok(record);
        }
        Err(ModelError::WeightsNotFound {
            name: self.name(),
            path: published,
            url: self.url(),
        })
    }
}

impl FromStr for PretrainedWeights {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rgb_imagenet" => Ok(PretrainedWeights::RgbImagenet),
            "flow_imagenet" => Ok(PretrainedWeights::FlowImagenet),
            "rgb_charades" => Ok(PretrainedWeights::RgbCharades),
            "flow_charades" => Ok(PretrainedWeights::FlowCharades),
            other => Err(ModelError::UnknownWeights(other.to_string())),
        }
    }
}

/// Build the RGB (3-channel) and/or flow (2-channel) backbones. A stream is built when
/// its flag is set and loaded from its record when a path is given.
pub fn i3d_joint<B: Backend>(
    cfg: &InceptionI3dConfig,
    rgb: Option<Option<&Path>>,
    flow: Option<Option<&Path>>,
    device: &B::Device,
) -> ModelResult<(Option<InceptionI3d<B>>, Option<InceptionI3d<B>>)> {
    let build = |in_channels: usize, weights: Option<&Path>| -> ModelResult<InceptionI3d<B>> {
        let net = InceptionI3d::new(&cfg.clone().with_in_channels(in_channels), device);
        match weights {
            Some(path) => {
                tracing::info!(in_channels, "loading I3D weights from {}", path.display());
                net.load_pretrained(path, device)
            }
            None => Ok(net),
        }
    };
    let rgb = rgb.map(|w| build(3, w)).transpose()?;
    let flow = flow.map(|w| build(2, w)).transpose()?;
    Ok((rgb, flow))
}
