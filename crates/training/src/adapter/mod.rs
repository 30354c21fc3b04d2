//! Per-method loss computation over a shared encoder/classifier/critic network.

pub mod cdan;
pub mod dann;
pub mod mmd;
pub mod wdgrl;

use crate::error::{TrainError, TrainResult};
use crate::losses::cross_entropy_logits;
use crate::method::Method;
use crate::metrics::StepMetrics;
use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use data_contracts::ImageModality;
use models::{
    ClassNet, ClassNetConfig, DomainNet, DomainNetConfig, EncodedClips, Endpoint, RandomLayer,
    VideoEncoder, VideoEncoderConfig,
};
use std::path::PathBuf;
use video_dataset::{DomainBatch, ModalBatch};

pub use cdan::CdanAdapter;
pub use dann::DannAdapter;
pub use mmd::{MmdAdapter, MmdKind};
pub use wdgrl::{WdgrlAdapter, WdgrlForward};

/// Feature encoder, task classifier and the method's optional critic.
#[derive(Module, Debug)]
pub struct AdaptNet<B: Backend> {
    pub encoder: VideoEncoder<B>,
    pub classifier: ClassNet<B>,
    pub critic: Option<DomainNet<B>>,
    pub random_layer: Option<RandomLayer<B>>,
}

/// Everything needed to build an [`AdaptNet`].
#[derive(Debug, Clone)]
pub struct NetSpec {
    pub modality: ImageModality,
    pub final_endpoint: Endpoint,
    pub num_classes: usize,
    pub rgb_weights: Option<PathBuf>,
    pub flow_weights: Option<PathBuf>,
    /// CDAN: project through a random multilinear layer of this width instead of the
    /// full outer product.
    pub random_dim: Option<usize>,
}

pub fn build_adapt_net<B: Backend>(
    method: Method,
    spec: &NetSpec,
    device: &B::Device,
) -> TrainResult<AdaptNet<B>> {
    let mut enc_cfg = VideoEncoderConfig::new(spec.modality).with_final_endpoint(spec.final_endpoint);
    enc_cfg.rgb_weights = spec.rgb_weights.clone();
    enc_cfg.flow_weights = spec.flow_weights.clone();
    let encoder = VideoEncoder::new(&enc_cfg, device)?;
    let stream_dim = encoder.stream_dim();
    let classifier = ClassNet::new(
        &ClassNetConfig::new(encoder.fused_dim(), spec.num_classes),
        device,
    );

    let mut random_layer = None;
    let critic = match method {
        Method::Source | Method::Dann => Some(DomainNetConfig::new(stream_dim)),
        Method::Cdan | Method::CdanE => {
            let input = match spec.random_dim {
                Some(dim) => {
                    random_layer = Some(RandomLayer::new(&[stream_dim, spec.num_classes], dim, device));
                    dim
                }
                None => stream_dim * spec.num_classes,
            };
            Some(DomainNetConfig::new(input))
        }
        Method::Wdgrl => Some(DomainNetConfig::new(encoder.fused_dim()).with_batch_norm(false)),
        Method::Dan | Method::Jan => None,
    }
    .map(|cfg| DomainNet::new(&cfg, device));

    tracing::info!(
        %method,
        modality = %spec.modality,
        endpoint = %spec.final_endpoint,
        stream_dim,
        critic = critic.is_some(),
        random_layer = random_layer.is_some(),
        "built adaptation network"
    );
    Ok(AdaptNet {
        encoder,
        classifier,
        critic,
        random_layer,
    })
}

/// Losses of one source/target batch. `adv_loss` is the domain term weighted by lambda.
#[derive(Debug, Clone)]
pub struct LossOutput<B: Backend> {
    pub task_loss: Tensor<B, 1>,
    pub adv_loss: Tensor<B, 1>,
    pub metrics: StepMetrics,
}

impl<B: Backend> LossOutput<B> {
    pub fn total(&self, lambda: f64, warm_up: bool) -> Tensor<B, 1> {
        if warm_up {
            self.task_loss.clone()
        } else {
            self.task_loss.clone() + self.adv_loss.clone().mul_scalar(lambda)
        }
    }
}

/// Hyper-parameters the factories need beyond the method itself.
#[derive(Debug, Clone, Copy)]
pub struct AdapterParams {
    pub k_critic: usize,
    pub gamma: f64,
    pub beta_ratio: f64,
}

impl Default for AdapterParams {
    fn default() -> Self {
        Self {
            k_critic: 5,
            gamma: 10.0,
            beta_ratio: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Adapter {
    Dann(DannAdapter),
    Cdan(CdanAdapter),
    Wdgrl(WdgrlAdapter),
    Mmd(MmdAdapter),
}

/// Adversarial methods: Source, DANN, CDAN, CDAN-E and WDGRL.
pub fn create_dann_like(method: Method, params: &AdapterParams) -> TrainResult<Adapter> {
    match method {
        Method::Source | Method::Dann => Ok(Adapter::Dann(DannAdapter::new(method))),
        Method::Cdan => Ok(Adapter::Cdan(CdanAdapter::new(false))),
        Method::CdanE => Ok(Adapter::Cdan(CdanAdapter::new(true))),
        Method::Wdgrl => Ok(Adapter::Wdgrl(WdgrlAdapter {
            k_critic: params.k_critic,
            gamma: params.gamma,
            beta_ratio: params.beta_ratio,
        })),
        Method::Dan | Method::Jan => Err(TrainError::WrongFamily {
            method: method.to_string(),
            factory: "create_dann_like",
        }),
    }
}

/// Discrepancy methods: DAN and JAN.
pub fn create_mmd_based(method: Method) -> TrainResult<Adapter> {
    match method {
        Method::Dan => Ok(Adapter::Mmd(MmdAdapter::dan())),
        Method::Jan => Ok(Adapter::Mmd(MmdAdapter::jan())),
        other => Err(TrainError::WrongFamily {
            method: other.to_string(),
            factory: "create_mmd_based",
        }),
    }
}

pub fn create_adapter(method: Method, params: &AdapterParams) -> TrainResult<Adapter> {
    if method.is_mmd_method() {
        create_mmd_based(method)
    } else {
        create_dann_like(method, params)
    }
}

impl Adapter {
    pub fn method(&self) -> Method {
        match self {
            Adapter::Dann(a) => a.method,
            Adapter::Cdan(a) if a.entropy => Method::CdanE,
            Adapter::Cdan(_) => Method::Cdan,
            Adapter::Wdgrl(_) => Method::Wdgrl,
            Adapter::Mmd(a) => match a.kind {
                MmdKind::Dan => Method::Dan,
                MmdKind::Jan => Method::Jan,
            },
        }
    }

    pub fn compute_loss<B: Backend>(
        &self,
        net: &AdaptNet<B>,
        batch: &DomainBatch<B>,
    ) -> TrainResult<LossOutput<B>> {
        match self {
            Adapter::Dann(a) => a.compute_loss(net, batch),
            Adapter::Cdan(a) => a.compute_loss(net, batch),
            Adapter::Wdgrl(a) => a.compute_loss(net, batch),
            Adapter::Mmd(a) => a.compute_loss(net, batch),
        }
    }

    /// The critic schedule, for methods that train their critic separately.
    pub fn wdgrl(&self) -> Option<&WdgrlAdapter> {
        match self {
            Adapter::Wdgrl(a) => Some(a),
            _ => None,
        }
    }
}

/// Encoder outputs and class logits for both sides of a batch.
pub(crate) struct Forwarded<B: Backend> {
    pub source: EncodedClips<B>,
    pub target: EncodedClips<B>,
    pub y_s: Tensor<B, 2>,
    pub y_t: Tensor<B, 2>,
}

fn check_streams<B: Backend>(
    modality: ImageModality,
    batch: &ModalBatch<B>,
    side: &str,
) -> TrainResult<()> {
    if batch.rgb.is_some() != modality.uses_rgb() || batch.flow.is_some() != modality.uses_flow()
    {
        return Err(TrainError::ModalityMismatch {
            expected: modality.to_string(),
            detail: format!(
                "{side} batch has rgb={} flow={}",
                batch.rgb.is_some(),
                batch.flow.is_some()
            ),
        });
    }
    Ok(())
}

pub(crate) fn encode_pair<B: Backend>(
    net: &AdaptNet<B>,
    batch: &DomainBatch<B>,
) -> TrainResult<(EncodedClips<B>, EncodedClips<B>)> {
    let modality = net.encoder.modality();
    check_streams(modality, &batch.source, "source")?;
    check_streams(modality, &batch.target, "target")?;
    let source = net
        .encoder
        .encode(batch.source.rgb.clone(), batch.source.flow.clone())?;
    let target = net
        .encoder
        .encode(batch.target.rgb.clone(), batch.target.flow.clone())?;
    Ok((source, target))
}

pub(crate) fn forward_pair<B: Backend>(
    net: &AdaptNet<B>,
    batch: &DomainBatch<B>,
) -> TrainResult<Forwarded<B>> {
    let (source, target) = encode_pair(net, batch)?;
    let y_s = net.classifier.forward(source.fused());
    let y_t = net.classifier.forward(target.fused());
    Ok(Forwarded {
        source,
        target,
        y_s,
        y_t,
    })
}

/// Source classification loss plus per-sample correctness on both domains. Target
/// labels are only used for reporting.
pub(crate) fn task_terms<B: Backend>(
    fwd: &Forwarded<B>,
    batch: &DomainBatch<B>,
) -> TrainResult<(Tensor<B, 1>, StepMetrics)> {
    let (task_loss, source_correct) =
        cross_entropy_logits(fwd.y_s.clone(), batch.source.labels.clone(), None)?;
    let (_, target_correct) =
        cross_entropy_logits(fwd.y_t.clone(), batch.target.labels.clone(), None)?;
    Ok((
        task_loss,
        StepMetrics {
            source_correct,
            target_correct,
            ..StepMetrics::default()
        },
    ))
}

/// Domain labels: 0 for source, 1 for target.
pub(crate) fn domain_labels<B: Backend>(
    n: usize,
    is_target: bool,
    device: &B::Device,
) -> Tensor<B, 1, Int> {
    if is_target {
        Tensor::ones([n], device)
    } else {
        Tensor::zeros([n], device)
    }
}

pub(crate) fn sum_terms<B: Backend>(terms: Vec<Tensor<B, 1>>) -> TrainResult<Tensor<B, 1>> {
    terms
        .into_iter()
        .reduce(|acc, t| acc + t)
        .ok_or_else(|| TrainError::shape("adaptation loss", "no feature streams"))
}

pub(crate) fn require_critic<'a, B: Backend>(
    net: &'a AdaptNet<B>,
    method: &'static str,
) -> TrainResult<&'a DomainNet<B>> {
    net.critic.as_ref().ok_or(TrainError::MissingCritic(method))
}
