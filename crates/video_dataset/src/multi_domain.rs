//! Source/target pairing, per-domain splits and epoch sampling.

use crate::source::ClipDataset;
use crate::types::{DatasetError, DatasetResult};
use data_contracts::{ClipSplit, ImageModality};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// How training indices are drawn each epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeightType {
    /// Shuffled natural order.
    #[default]
    Natural,
    /// Sampled with replacement, each class equally likely.
    Balanced,
}

impl FromStr for WeightType {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "natural" => Ok(WeightType::Natural),
            "balanced" => Ok(WeightType::Balanced),
            other => Err(DatasetError::Other(format!("unknown weight type {other:?}"))),
        }
    }
}

/// Which domain dictates the number of training batches per epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SizeType {
    #[default]
    Source,
    Max,
    Min,
}

impl FromStr for SizeType {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "source" => Ok(SizeType::Source),
            "max" => Ok(SizeType::Max),
            "min" => Ok(SizeType::Min),
            other => Err(DatasetError::Other(format!("unknown size type {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SplitKind {
    Train,
    Val,
    Test,
}

impl SplitKind {
    /// Prefix used for metric names.
    pub fn tag(self) -> &'static str {
        match self {
            SplitKind::Train => "T",
            SplitKind::Val => "V",
            SplitKind::Test => "Te",
        }
    }

    fn name(self) -> &'static str {
        match self {
            SplitKind::Train => "train",
            SplitKind::Val => "val",
            SplitKind::Test => "test",
        }
    }

    fn salt(self) -> u64 {
        match self {
            SplitKind::Train => 0x5EED_0001,
            SplitKind::Val => 0x5EED_0002,
            SplitKind::Test => 0x5EED_0003,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DomainSplits {
    pub train: Vec<usize>,
    pub val: Vec<usize>,
    pub test: Vec<usize>,
}

impl DomainSplits {
    /// Carve a validation set out of the train-tagged clips. Clips tagged test form
    /// the test split; without any, the validation set doubles as test.
    pub fn from_dataset(ds: &dyn ClipDataset, val_ratio: f32, rng: &mut StdRng) -> Self {
        let mut pool: Vec<usize> = Vec::new();
        let mut test: Vec<usize> = Vec::new();
        for i in 0..ds.len() {
            match ds.split(i) {
                ClipSplit::Train => pool.push(i),
                ClipSplit::Test => test.push(i),
            }
        }
        pool.shuffle(rng);
        let n_val = ((pool.len() as f32) * val_ratio.clamp(0.0, 1.0)).round() as usize;
        let n_val = n_val.min(pool.len().saturating_sub(1));
        let val: Vec<usize> = pool[..n_val].to_vec();
        let train: Vec<usize> = pool[n_val..].to_vec();
        if test.is_empty() {
            test = val.clone();
        }
        Self { train, val, test }
    }

    pub fn get(&self, split: SplitKind) -> &[usize] {
        match split {
            SplitKind::Train => &self.train,
            SplitKind::Val => &self.val,
            SplitKind::Test => &self.test,
        }
    }
}

/// Equal-length source and target index lists forming one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedIndices {
    pub source: Vec<usize>,
    pub target: Vec<usize>,
}

impl PairedIndices {
    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

pub struct MultiDomainDatasets {
    source: Arc<dyn ClipDataset>,
    target: Arc<dyn ClipDataset>,
    modality: ImageModality,
    seed: u64,
    weight_type: WeightType,
    size_type: SizeType,
    source_splits: DomainSplits,
    target_splits: DomainSplits,
}

impl MultiDomainDatasets {
    pub fn new(
        source: Arc<dyn ClipDataset>,
        target: Arc<dyn ClipDataset>,
        modality: ImageModality,
        seed: u64,
        weight_type: WeightType,
        size_type: SizeType,
        val_ratio: f32,
    ) -> DatasetResult<Self> {
        if source.num_classes() != target.num_classes() {
            return Err(DatasetError::ClassMismatch {
                source_classes: source.num_classes(),
                target_classes: target.num_classes(),
            });
        }
        if source.shape() != target.shape() {
            return Err(DatasetError::ShapeMismatch {
                expected: source.shape(),
                actual: target.shape(),
            });
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let source_splits = DomainSplits::from_dataset(source.as_ref(), val_ratio, &mut rng);
        let target_splits = DomainSplits::from_dataset(target.as_ref(), val_ratio, &mut rng);
        // Validation may be empty; training and the final test pass may not.
        for (ds, splits) in [(&source, &source_splits), (&target, &target_splits)] {
            for split in [SplitKind::Train, SplitKind::Test] {
                if splits.get(split).is_empty() {
                    return Err(DatasetError::EmptySplit {
                        domain: ds.domain().to_string(),
                        split: split.name(),
                    });
                }
            }
        }
        tracing::info!(
            source = source.domain(),
            target = target.domain(),
            %modality,
            source_train = source_splits.train.len(),
            source_val = source_splits.val.len(),
            target_train = target_splits.train.len(),
            target_val = target_splits.val.len(),
            target_test = target_splits.test.len(),
            "prepared multi-domain splits"
        );
        Ok(Self {
            source,
            target,
            modality,
            seed,
            weight_type,
            size_type,
            source_splits,
            target_splits,
        })
    }

    pub fn source(&self) -> &dyn ClipDataset {
        self.source.as_ref()
    }

    pub fn target(&self) -> &dyn ClipDataset {
        self.target.as_ref()
    }

    pub fn modality(&self) -> ImageModality {
        self.modality
    }

    pub fn num_classes(&self) -> usize {
        self.source.num_classes()
    }

    pub fn source_splits(&self) -> &DomainSplits {
        &self.source_splits
    }

    pub fn target_splits(&self) -> &DomainSplits {
        &self.target_splits
    }

    fn train_len(&self) -> usize {
        let src = self.source_splits.train.len();
        let tgt = self.target_splits.train.len();
        match self.size_type {
            SizeType::Source => src,
            SizeType::Max => src.max(tgt),
            SizeType::Min => src.min(tgt),
        }
    }

    /// Full training batches per epoch.
    pub fn batches_per_epoch(&self, batch_size: usize) -> usize {
        if batch_size == 0 {
            return 0;
        }
        self.train_len() / batch_size
    }

    /// Paired batches for one pass over `split`.
    ///
    /// Training draws `train_len` indices per domain (cycling the shorter one) and
    /// drops the trailing partial batch. Evaluation walks the target split once in
    /// order, cycling source indices alongside, and keeps the partial batch.
    pub fn batches(
        &self,
        split: SplitKind,
        batch_size: usize,
        epoch: usize,
    ) -> DatasetResult<Vec<PairedIndices>> {
        if batch_size == 0 {
            return Err(DatasetError::Other("batch size must be positive".into()));
        }
        let src_split = self.source_splits.get(split);
        let tgt_split = self.target_splits.get(split);
        for (ds, idx) in [(&self.source, src_split), (&self.target, tgt_split)] {
            if idx.is_empty() {
                return Err(DatasetError::EmptySplit {
                    domain: ds.domain().to_string(),
                    split: split.name(),
                });
            }
        }
        let mut rng = StdRng::seed_from_u64(
            self.seed
                ^ split.salt()
                ^ (epoch as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
        );

        let (source, target) = match split {
            SplitKind::Train => {
                let n = self.train_len();
                (
                    self.draw(self.source.as_ref(), src_split, n, &mut rng),
                    self.draw(self.target.as_ref(), tgt_split, n, &mut rng),
                )
            }
            SplitKind::Val | SplitKind::Test => {
                let n = tgt_split.len();
                (cycle_to(src_split, n), tgt_split.to_vec())
            }
        };

        let drop_last = split == SplitKind::Train;
        let mut out = Vec::with_capacity(source.len() / batch_size + 1);
        for (src, tgt) in source.chunks(batch_size).zip(target.chunks(batch_size)) {
            if drop_last && src.len() < batch_size {
                break;
            }
            out.push(PairedIndices {
                source: src.to_vec(),
                target: tgt.to_vec(),
            });
        }
        Ok(out)
    }

    fn draw(
        &self,
        ds: &dyn ClipDataset,
        pool: &[usize],
        n: usize,
        rng: &mut StdRng,
    ) -> Vec<usize> {
        match self.weight_type {
            WeightType::Natural => {
                let mut out = Vec::with_capacity(n);
                while out.len() < n {
                    let mut round = pool.to_vec();
                    round.shuffle(rng);
                    let take = (n - out.len()).min(round.len());
                    out.extend_from_slice(&round[..take]);
                }
                out
            }
            WeightType::Balanced => balanced_draw(ds, pool, n, rng),
        }
    }
}

fn cycle_to(pool: &[usize], n: usize) -> Vec<usize> {
    pool.iter().copied().cycle().take(n).collect()
}

/// Sample `n` indices with replacement, weighting each clip by the inverse of its
/// class frequency within `pool`.
fn balanced_draw(ds: &dyn ClipDataset, pool: &[usize], n: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut counts = vec![0usize; ds.num_classes().max(1)];
    for &i in pool {
        counts[ds.label(i)] += 1;
    }
    let mut cumulative = Vec::with_capacity(pool.len());
    let mut total = 0.0f64;
    for &i in pool {
        total += 1.0 / counts[ds.label(i)] as f64;
        cumulative.push(total);
    }
    (0..n)
        .map(|_| {
            let r = rng.random::<f64>() * total;
            let pos = cumulative.partition_point(|&c| c <= r);
            pool[pos.min(pool.len() - 1)]
        })
        .collect()
}
