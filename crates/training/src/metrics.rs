//! Per-split metric accumulation and JSON-lines logging.

use crate::error::{TrainError, TrainResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use video_dataset::SplitKind;

/// Host-side results of one loss evaluation.
#[derive(Debug, Clone, Default)]
pub struct StepMetrics {
    pub source_correct: Vec<bool>,
    pub target_correct: Vec<bool>,
    pub source_domain_correct: Vec<bool>,
    pub target_domain_correct: Vec<bool>,
    pub mmd: Option<f64>,
    pub wasserstein: Option<f64>,
}

/// Aggregates step metrics over an epoch. Accuracies are pooled over samples; scalars
/// are averaged over steps.
#[derive(Debug, Clone)]
pub struct MetricsAccumulator {
    split: SplitKind,
    counts: BTreeMap<&'static str, (usize, usize)>,
    scalars: BTreeMap<&'static str, (f64, usize)>,
}

impl MetricsAccumulator {
    pub fn new(split: SplitKind) -> Self {
        Self {
            split,
            counts: BTreeMap::new(),
            scalars: BTreeMap::new(),
        }
    }

    pub fn split(&self) -> SplitKind {
        self.split
    }

    fn count(&mut self, name: &'static str, hits: &[bool]) {
        if hits.is_empty() {
            return;
        }
        let entry = self.counts.entry(name).or_default();
        entry.0 += hits.iter().filter(|&&h| h).count();
        entry.1 += hits.len();
    }

    fn scalar(&mut self, name: &'static str, value: f64) {
        let entry = self.scalars.entry(name).or_default();
        entry.0 += value;
        entry.1 += 1;
    }

    pub fn add_step(&mut self, step: &StepMetrics, task_loss: f64, adv_loss: f64, total_loss: f64) {
        self.count("source_acc", &step.source_correct);
        self.count("target_acc", &step.target_correct);
        self.count("source_domain_acc", &step.source_domain_correct);
        self.count("target_domain_acc", &step.target_domain_correct);
        self.count("domain_acc", &step.source_domain_correct);
        self.count("domain_acc", &step.target_domain_correct);
        self.scalar("task_loss", task_loss);
        self.scalar("adv_loss", adv_loss);
        self.scalar("total_loss", total_loss);
        if let Some(mmd) = step.mmd {
            self.scalar("mmd", mmd);
        }
        if let Some(w) = step.wasserstein {
            self.scalar("wasserstein_dist", w);
        }
    }

    /// Value of `name` (without split prefix), if anything was recorded for it.
    pub fn get(&self, name: &str) -> Option<f64> {
        if let Some((hits, total)) = self.counts.get(name) {
            return Some(*hits as f64 / (*total).max(1) as f64);
        }
        self.scalars
            .get(name)
            .map(|(sum, n)| sum / (*n).max(1) as f64)
    }

    /// All metrics keyed `"{split}_{name}"`.
    pub fn summary(&self) -> BTreeMap<String, f64> {
        let tag = self.split.tag();
        let mut out = BTreeMap::new();
        for name in self.counts.keys().chain(self.scalars.keys()) {
            if let Some(v) = self.get(name) {
                out.insert(format!("{tag}_{name}"), v);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub split: &'static str,
    #[serde(flatten)]
    pub metrics: BTreeMap<String, f64>,
}

impl EpochRecord {
    pub fn new(epoch: usize, acc: &MetricsAccumulator) -> Self {
        Self {
            epoch,
            split: acc.split().tag(),
            metrics: acc.summary(),
        }
    }
}

/// Appends one JSON object per line; a sink without a path discards records.
pub struct MetricsSink {
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
}

impl MetricsSink {
    pub fn open(path: &Path) -> TrainResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| TrainError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| TrainError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn disabled() -> Self {
        Self {
            path: None,
            writer: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn write(&mut self, record: &EpochRecord) -> TrainResult<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        let line = serde_json::to_string(record)?;
        let io_err = |source| TrainError::Io {
            path: self.path.clone().unwrap_or_default(),
            source,
        };
        writeln!(writer, "{line}").map_err(io_err)?;
        writer.flush().map_err(io_err)
    }
}
