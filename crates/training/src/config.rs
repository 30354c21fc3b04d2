//! Experiment configuration loaded from TOML.

use crate::error::{TrainError, TrainResult};
use crate::method::Method;
use data_contracts::ImageModality;
use models::Endpoint;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use video_dataset::{SizeType, WeightType};

/// Environment variable naming a config file that overrides the CLI path.
pub const CONFIG_ENV: &str = "ACTION_DA_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExperimentConfig {
    pub dataset: DatasetSection,
    pub solver: SolverSection,
    pub dan: DanSection,
    pub wdgrl: WdgrlSection,
    pub model: ModelSection,
    pub output: OutputSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainSection {
    pub name: String,
    /// Clip manifest; when absent the domain is generated synthetically.
    pub manifest: Option<String>,
    /// Appearance shift of a synthetic domain.
    pub shift: f32,
}

impl DomainSection {
    fn named(name: &str, shift: f32) -> Self {
        Self {
            name: name.to_string(),
            manifest: None,
            shift,
        }
    }
}

impl Default for DomainSection {
    fn default() -> Self {
        Self::named("source", 0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSection {
    pub source: DomainSection,
    pub target: DomainSection,
    pub image_modality: String,
    /// Used by synthetic domains; manifests carry their own class count.
    pub num_classes: usize,
    pub clips_per_class: usize,
    pub frames: usize,
    pub height: usize,
    pub width: usize,
    pub val_ratio: f32,
    pub weight_type: WeightType,
    pub size_type: SizeType,
}

impl Default for DatasetSection {
    fn default() -> Self {
        Self {
            source: DomainSection::named("source", 0.0),
            target: DomainSection::named("target", 0.4),
            image_modality: "rgb".to_string(),
            num_classes: 8,
            clips_per_class: 8,
            frames: 16,
            height: 224,
            width: 224,
            val_ratio: 0.1,
            weight_type: WeightType::Natural,
            size_type: SizeType::Source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OptimizerKind {
    #[default]
    #[serde(rename = "SGD", alias = "sgd")]
    Sgd,
    #[serde(rename = "Adam", alias = "adam")]
    Adam,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSection {
    pub seed: u64,
    pub base_lr: f64,
    pub momentum: f64,
    pub weight_decay: f64,
    pub nesterov: bool,
    #[serde(rename = "type")]
    pub kind: OptimizerKind,
    pub train_batch_size: usize,
    pub test_batch_size: usize,
    pub max_epochs: usize,
    /// Warm-up epochs trained on the task loss only.
    pub min_epochs: usize,
    pub init_lambda: f64,
    pub ad_lambda: bool,
    pub ad_lr: bool,
    /// Stop after this many epochs without a better validation loss.
    pub early_stop_patience: Option<usize>,
}

impl Default for SolverSection {
    fn default() -> Self {
        Self {
            seed: 2020,
            base_lr: 0.01,
            momentum: 0.9,
            weight_decay: 0.0005,
            nesterov: true,
            kind: OptimizerKind::Sgd,
            train_batch_size: 16,
            test_batch_size: 16,
            max_epochs: 100,
            min_epochs: 20,
            init_lambda: 1.0,
            ad_lambda: true,
            ad_lr: true,
            early_stop_patience: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DanSection {
    pub method: String,
    pub userandom: bool,
    pub random_dim: usize,
}

impl Default for DanSection {
    fn default() -> Self {
        Self {
            method: "CDAN".to_string(),
            userandom: false,
            random_dim: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WdgrlSection {
    pub k_critic: usize,
    pub gamma: f64,
    pub beta_ratio: f64,
}

impl Default for WdgrlSection {
    fn default() -> Self {
        Self {
            k_critic: 5,
            gamma: 10.0,
            beta_ratio: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    /// Last I3D layer kept; features are pooled from its output.
    pub final_endpoint: String,
    pub rgb_weights: Option<String>,
    pub flow_weights: Option<String>,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            final_endpoint: "Mixed_5c".to_string(),
            rgb_weights: None,
            flow_weights: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub dir: String,
    pub metrics_file: String,
    pub checkpoint_file: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: "outputs".to_string(),
            metrics_file: "metrics.jsonl".to_string(),
            checkpoint_file: "best_model.bin".to_string(),
        }
    }
}

impl ExperimentConfig {
    /// Load `path`, or the file named by `ACTION_DA_CONFIG` when that is set.
    pub fn load(path: Option<&Path>) -> TrainResult<Self> {
        let chosen = match std::env::var(CONFIG_ENV) {
            Ok(env_path) if !env_path.trim().is_empty() => Some(expand_path(&env_path)),
            _ => path.map(Path::to_path_buf),
        };
        let cfg = match chosen {
            Some(p) => Self::from_path(&p)?,
            None => Self::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> TrainResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| TrainError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| TrainError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn method(&self) -> TrainResult<Method> {
        self.dan.method.parse()
    }

    pub fn modality(&self) -> TrainResult<ImageModality> {
        self.dataset
            .image_modality
            .parse()
            .map_err(|e| TrainError::Config(format!("{e}")))
    }

    pub fn final_endpoint(&self) -> TrainResult<Endpoint> {
        Ok(self.model.final_endpoint.parse()?)
    }

    pub fn validate(&self) -> TrainResult<()> {
        let s = &self.solver;
        if s.train_batch_size == 0 || s.test_batch_size == 0 {
            return Err(TrainError::Config("batch sizes must be positive".into()));
        }
        if s.max_epochs < s.min_epochs {
            return Err(TrainError::Config(format!(
                "max_epochs ({}) is below min_epochs ({})",
                s.max_epochs, s.min_epochs
            )));
        }
        if !(s.base_lr.is_finite() && s.base_lr > 0.0) {
            return Err(TrainError::Config(format!("base_lr {} must be positive", s.base_lr)));
        }
        if !(0.0..1.0).contains(&self.dataset.val_ratio) {
            return Err(TrainError::Config(format!(
                "val_ratio {} must lie in [0, 1)",
                self.dataset.val_ratio
            )));
        }
        let d = &self.dataset;
        if d.frames == 0 || d.height == 0 || d.width == 0 {
            return Err(TrainError::Config("clip shape must be non-zero".into()));
        }
        let method = self.method()?;
        self.modality()?;
        self.final_endpoint()?;
        if method == Method::Wdgrl && self.wdgrl.k_critic == 0 {
            return Err(TrainError::Config("wdgrl.k_critic must be positive".into()));
        }
        if method.is_cdan_method() && self.dan.userandom && self.dan.random_dim == 0 {
            return Err(TrainError::Config("dan.random_dim must be positive".into()));
        }
        Ok(())
    }

    pub fn output_dir(&self) -> PathBuf {
        expand_path(&self.output.dir)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.output_dir().join(&self.output.metrics_file)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.output_dir().join(&self.output.checkpoint_file)
    }
}

/// Expand a leading `~` to `$HOME` and `${VAR}` references from the environment.
/// Unknown variables are left in place.
pub fn expand_path(raw: &str) -> PathBuf {
    let mut out = raw.to_string();
    if let Some(stripped) = out.strip_prefix('~') {
        if let Ok(home) = std::env::var("HOME") {
            out = format!("{home}{stripped}");
        }
    }
    PathBuf::from(expand_env(&out))
}

fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match std::env::var(key) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => {
                        out.push_str("${");
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
