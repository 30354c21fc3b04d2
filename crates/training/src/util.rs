use crate::adapter::{build_adapt_net, create_adapter, AdaptNet, AdapterParams, NetSpec};
use crate::config::{expand_path, DomainSection, ExperimentConfig, OptimizerKind, SolverSection};
use crate::metrics::MetricsSink;
use crate::trainer::{load_checkpoint, AdaptTrainer, FitReport, TrainerOptions};
use burn::backend::Autodiff;
use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{AdamConfig, SgdConfig};
use burn::tensor::backend::Backend;
use clap::{Parser, ValueEnum};
use models::DomainNet;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use video_dataset::{
    ClipDataset, ClipShape, FrameFolderClips, MultiDomainDatasets, SyntheticDomain,
};

/// Backend alias for training/eval (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;

pub type ADBackend = Autodiff<TrainBackend>;

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BackendKind {
    NdArray,
    Wgpu,
}

pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            anyhow::bail!("backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose ndarray backend")
        }
        (BackendKind::NdArray, true) => {
            tracing::warn!("built with backend-wgpu; the WGPU backend is used despite --backend nd-array");
        }
        _ => {}
    }
    Ok(())
}

/// Install the global `tracing` subscriber; `RUST_LOG` overrides the `info` default.
/// Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "train",
    about = "Train a video domain-adaptation model (DANN, CDAN, WDGRL, DAN, JAN)"
)]
pub struct TrainArgs {
    /// Experiment config (TOML). `ACTION_DA_CONFIG` takes precedence when set.
    #[arg(long = "cfg")]
    pub cfg: Option<PathBuf>,
    /// Ignore manifests and generate synthetic source/target domains.
    #[arg(long, default_value_t = false)]
    pub synthetic: bool,
    /// Override `output.dir`.
    #[arg(long)]
    pub output_dir: Option<String>,
    /// Override `solver.max_epochs`.
    #[arg(long)]
    pub max_epochs: Option<usize>,
    /// Override `dan.method`.
    #[arg(long)]
    pub method: Option<String>,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "eval", about = "Evaluate a trained checkpoint on the target test split")]
pub struct EvalArgs {
    #[arg(long = "cfg")]
    pub cfg: Option<PathBuf>,
    /// Checkpoint to load (defaults to the config's output checkpoint).
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    pub synthetic: bool,
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
}

/// Outcome of a training run, returned for callers that script several runs.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub checkpoint: PathBuf,
    pub report: FitReport,
    pub test: BTreeMap<String, f64>,
}

fn clip_shape(cfg: &ExperimentConfig) -> ClipShape {
    ClipShape::new(cfg.dataset.frames, cfg.dataset.height, cfg.dataset.width)
}

fn open_domain(
    cfg: &ExperimentConfig,
    section: &DomainSection,
    synthetic: bool,
    salt: u64,
) -> anyhow::Result<Arc<dyn ClipDataset>> {
    let modality = cfg.modality()?;
    let shape = clip_shape(cfg);
    match (&section.manifest, synthetic) {
        (Some(manifest), false) => {
            let path = expand_path(manifest);
            Ok(Arc::new(FrameFolderClips::open(&path, shape, modality)?))
        }
        _ => {
            tracing::info!(domain = %section.name, shift = section.shift, "generating synthetic domain");
            let clips = SyntheticDomain::new(section.name.clone(), cfg.dataset.num_classes, shape)
                .with_shift(section.shift)
                .with_clips_per_class(cfg.dataset.clips_per_class)
                .with_seed(cfg.solver.seed ^ salt)
                .generate()?;
            Ok(Arc::new(clips))
        }
    }
}

/// Source and target datasets from manifests, or synthetic domains when a manifest is
/// missing or `synthetic` is set.
pub fn build_datasets(
    cfg: &ExperimentConfig,
    synthetic: bool,
) -> anyhow::Result<MultiDomainDatasets> {
    let d = &cfg.dataset;
    let source = open_domain(cfg, &d.source, synthetic, 0x51)?;
    let target = open_domain(cfg, &d.target, synthetic, 0x7A)?;
    Ok(MultiDomainDatasets::new(
        source,
        target,
        cfg.modality()?,
        cfg.solver.seed,
        d.weight_type,
        d.size_type,
        d.val_ratio,
    )?)
}

pub fn net_spec(cfg: &ExperimentConfig, num_classes: usize) -> anyhow::Result<NetSpec> {
    let method = cfg.method()?;
    Ok(NetSpec {
        modality: cfg.modality()?,
        final_endpoint: cfg.final_endpoint()?,
        num_classes,
        rgb_weights: cfg.model.rgb_weights.as_deref().map(expand_path),
        flow_weights: cfg.model.flow_weights.as_deref().map(expand_path),
        random_dim: (method.is_cdan_method() && cfg.dan.userandom).then_some(cfg.dan.random_dim),
    })
}

fn adapter_params(cfg: &ExperimentConfig) -> AdapterParams {
    AdapterParams {
        k_critic: cfg.wdgrl.k_critic,
        gamma: cfg.wdgrl.gamma,
        beta_ratio: cfg.wdgrl.beta_ratio,
    }
}

pub fn sgd_config(solver: &SolverSection) -> SgdConfig {
    let momentum = MomentumConfig::new()
        .with_momentum(solver.momentum)
        .with_dampening(0.0)
        .with_nesterov(solver.nesterov);
    SgdConfig::new()
        .with_momentum(Some(momentum))
        .with_weight_decay(weight_decay(solver))
}

pub fn adam_config(solver: &SolverSection) -> AdamConfig {
    AdamConfig::new().with_weight_decay(weight_decay(solver))
}

fn weight_decay(solver: &SolverSection) -> Option<WeightDecayConfig> {
    (solver.weight_decay > 0.0).then(|| WeightDecayConfig::new(solver.weight_decay as f32))
}

fn apply_overrides(cfg: &mut ExperimentConfig, args: &TrainArgs) {
    if let Some(dir) = &args.output_dir {
        cfg.output.dir = dir.clone();
    }
    if let Some(epochs) = args.max_epochs {
        cfg.solver.max_epochs = epochs;
        cfg.solver.min_epochs = cfg.solver.min_epochs.min(epochs);
    }
    if let Some(method) = &args.method {
        cfg.dan.method = method.clone();
    }
}

pub fn run_train(args: TrainArgs) -> anyhow::Result<RunSummary> {
    validate_backend_choice(args.backend)?;
    let mut cfg = ExperimentConfig::load(args.cfg.as_deref())?;
    apply_overrides(&mut cfg, &args);
    cfg.validate()?;
    train_with_config(&cfg, args.synthetic)
}

/// Full run for an already-loaded config: data, network, fit, then test with the best
/// network.
pub fn train_with_config(cfg: &ExperimentConfig, synthetic: bool) -> anyhow::Result<RunSummary> {
    let method = cfg.method()?;
    let out_dir = cfg.output_dir();
    std::fs::create_dir_all(&out_dir)?;
    std::fs::write(out_dir.join("config.toml"), toml::to_string_pretty(cfg)?)?;

    <ADBackend as Backend>::seed(cfg.solver.seed);
    let device = <ADBackend as Backend>::Device::default();
    let data = build_datasets(cfg, synthetic)?;
    let net = build_adapt_net::<ADBackend>(method, &net_spec(cfg, data.num_classes())?, &device)?;
    let adapter = create_adapter(method, &adapter_params(cfg))?;
    let sink = MetricsSink::open(&cfg.metrics_path())?;
    let mut trainer = AdaptTrainer::new(adapter, &data, TrainerOptions::from_config(cfg), sink);

    let (best, report) = match cfg.solver.kind {
        OptimizerKind::Sgd => {
            let opt = sgd_config(&cfg.solver);
            let mut optim = opt.init::<ADBackend, AdaptNet<ADBackend>>();
            let mut critic_optim = opt.init::<ADBackend, DomainNet<ADBackend>>();
            trainer.fit(net, &mut optim, &mut critic_optim, &device)?
        }
        OptimizerKind::Adam => {
            let opt = adam_config(&cfg.solver);
            let mut optim = opt.init::<ADBackend, AdaptNet<ADBackend>>();
            let mut critic_optim = opt.init::<ADBackend, DomainNet<ADBackend>>();
            trainer.fit(net, &mut optim, &mut critic_optim, &device)?
        }
    };

    let test = trainer.test(&best.valid(), &device)?;
    let checkpoint = cfg.checkpoint_path();
    tracing::info!(
        %method,
        epochs = report.epochs_run,
        best_epoch = report.best_epoch,
        "saved checkpoint to {}",
        checkpoint.display()
    );
    Ok(RunSummary {
        checkpoint,
        report,
        test: test.summary(),
    })
}

pub fn run_eval(args: EvalArgs) -> anyhow::Result<BTreeMap<String, f64>> {
    validate_backend_choice(args.backend)?;
    let cfg = ExperimentConfig::load(args.cfg.as_deref())?;
    let checkpoint = args.checkpoint.clone().unwrap_or_else(|| cfg.checkpoint_path());
    evaluate_checkpoint(&cfg, &checkpoint, args.synthetic)
}

pub fn evaluate_checkpoint(
    cfg: &ExperimentConfig,
    checkpoint: &Path,
    synthetic: bool,
) -> anyhow::Result<BTreeMap<String, f64>> {
    let method = cfg.method()?;
    let device = <TrainBackend as Backend>::Device::default();
    let data = build_datasets(cfg, synthetic)?;
    // Pretrained backbone weights are superseded by the checkpoint.
    let mut spec = net_spec(cfg, data.num_classes())?;
    spec.rgb_weights = None;
    spec.flow_weights = None;
    let net = build_adapt_net::<TrainBackend>(method, &spec, &device)?;
    let net = load_checkpoint(net, checkpoint, &device)?;
    tracing::info!("loaded checkpoint {}", checkpoint.display());

    let adapter = create_adapter(method, &adapter_params(cfg))?;
    let sink = MetricsSink::open(&cfg.metrics_path())?;
    let mut trainer = AdaptTrainer::new(adapter, &data, TrainerOptions::from_config(cfg), sink);
    Ok(trainer.test(&net, &device)?.summary())
}
