use crate::error::{ModelError, ModelResult};
use crate::i3d::{i3d_joint, Endpoint, InceptionI3d, InceptionI3dConfig};
use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use data_contracts::ImageModality;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct VideoEncoderConfig {
    pub modality: ImageModality,
    pub final_endpoint: Endpoint,
    pub rgb_weights: Option<PathBuf>,
    pub flow_weights: Option<PathBuf>,
}

impl VideoEncoderConfig {
    pub fn new(modality: ImageModality) -> Self {
        Self {
            modality,
            final_endpoint: Endpoint::Mixed5c,
            rgb_weights: None,
            flow_weights: None,
        }
    }

    pub fn with_final_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.final_endpoint = endpoint;
        self
    }
}

/// Per-stream feature matrices, RGB first.
#[derive(Debug, Clone)]
pub struct EncodedClips<B: Backend> {
    pub streams: Vec<Tensor<B, 2>>,
}

impl<B: Backend> EncodedClips<B> {
    /// Streams concatenated along the feature axis.
    pub fn fused(&self) -> Tensor<B, 2> {
        match self.streams.as_slice() {
            [single] => single.clone(),
            many => Tensor::cat(many.to_vec(), 1),
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

/// One I3D backbone per active stream.
#[derive(Module, Debug)]
pub struct VideoEncoder<B: Backend> {
    rgb: Option<InceptionI3d<B>>,
    flow: Option<InceptionI3d<B>>,
}

impl<B: Backend> VideoEncoder<B> {
    pub fn new(cfg: &VideoEncoderConfig, device: &B::Device) -> ModelResult<Self> {
        let i3d = InceptionI3dConfig::default().with_final_endpoint(cfg.final_endpoint);
        let rgb = cfg
            .modality
            .uses_rgb()
            .then_some(cfg.rgb_weights.as_deref());
        let flow = cfg
            .modality
            .uses_flow()
            .then_some(cfg.flow_weights.as_deref());
        let (rgb, flow) = i3d_joint(&i3d, rgb, flow, device)?;
        Ok(Self { rgb, flow })
    }

    pub fn modality(&self) -> ImageModality {
        match (&self.rgb, &self.flow) {
            (Some(_), Some(_)) => ImageModality::Joint,
            (None, Some(_)) => ImageModality::Flow,
            _ => ImageModality::Rgb,
        }
    }

    /// Feature width of a single stream.
    pub fn stream_dim(&self) -> usize {
        self.rgb
            .as_ref()
            .or(self.flow.as_ref())
            .map(|net| net.feature_dim())
            .unwrap_or(0)
    }

    pub fn stream_count(&self) -> usize {
        usize::from(self.rgb.is_some()) + usize::from(self.flow.is_some())
    }

    /// Width of [`EncodedClips::fused`].
    pub fn fused_dim(&self) -> usize {
        self.stream_dim() * self.stream_count()
    }

    pub fn encode(
        &self,
        rgb: Option<Tensor<B, 5>>,
        flow: Option<Tensor<B, 5>>,
    ) -> ModelResult<EncodedClips<B>> {
        let mut streams = Vec::with_capacity(2);
        if let Some(net) = &self.rgb {
            let x = rgb.ok_or(ModelError::MissingStream { stream: "rgb" })?;
            streams.push(net.forward_features(x));
        }
        if let Some(net) = &self.flow {
            let x = flow.ok_or(ModelError::MissingStream { stream: "flow" })?;
            streams.push(net.forward_features(x));
        }
        if streams.is_empty() {
            return Err(ModelError::NoStreams);
        }
        Ok(EncodedClips { streams })
    }
}
