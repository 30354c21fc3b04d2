//! Epoch loop: schedule, critic updates, optimisation, validation and checkpointing.

use crate::adapter::{AdaptNet, Adapter, WdgrlAdapter};
use crate::config::ExperimentConfig;
use crate::error::{TrainError, TrainResult};
use crate::losses::scalar_value;
use crate::metrics::{EpochRecord, MetricsAccumulator, MetricsSink};
use crate::schedule::AdaptSchedule;
use burn::module::{AutodiffModule, Module};
use burn::optim::{GradientsParams, Optimizer};
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;
use models::DomainNet;
use std::path::{Path, PathBuf};
use video_dataset::{load_pair, DomainBatch, MultiDomainDatasets, SplitKind};

#[derive(Debug, Clone)]
pub struct TrainerOptions {
    pub base_lr: f64,
    pub train_batch_size: usize,
    pub test_batch_size: usize,
    pub max_epochs: usize,
    /// Warm-up epochs trained on the task loss alone.
    pub init_epochs: usize,
    pub init_lambda: f64,
    pub adapt_lambda: bool,
    pub adapt_lr: bool,
    pub early_stop_patience: Option<usize>,
    /// Where the best-validation network is written, if anywhere.
    pub checkpoint: Option<PathBuf>,
}

impl TrainerOptions {
    pub fn from_config(cfg: &ExperimentConfig) -> Self {
        let s = &cfg.solver;
        Self {
            base_lr: s.base_lr,
            train_batch_size: s.train_batch_size,
            test_batch_size: s.test_batch_size,
            max_epochs: s.max_epochs,
            init_epochs: s.min_epochs,
            init_lambda: s.init_lambda,
            adapt_lambda: s.ad_lambda,
            adapt_lr: s.ad_lr,
            early_stop_patience: s.early_stop_patience,
            checkpoint: Some(cfg.checkpoint_path()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FitReport {
    pub epochs_run: usize,
    pub best_epoch: Option<usize>,
    pub best_val_loss: Option<f64>,
    pub stopped_early: bool,
    /// Train and validation records, in the order they were written.
    pub history: Vec<EpochRecord>,
}

pub struct AdaptTrainer<'a> {
    adapter: Adapter,
    data: &'a MultiDomainDatasets,
    options: TrainerOptions,
    sink: MetricsSink,
    epochs_run: usize,
}

impl<'a> AdaptTrainer<'a> {
    pub fn new(
        adapter: Adapter,
        data: &'a MultiDomainDatasets,
        options: TrainerOptions,
        sink: MetricsSink,
    ) -> Self {
        Self {
            adapter,
            data,
            options,
            sink,
            epochs_run: 0,
        }
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    pub fn options(&self) -> &TrainerOptions {
        &self.options
    }

    pub fn schedule(&self) -> AdaptSchedule {
        AdaptSchedule {
            init_epochs: self.options.init_epochs,
            adapt_epochs: self
                .options
                .max_epochs
                .saturating_sub(self.options.init_epochs),
            batches_per_epoch: self.data.batches_per_epoch(self.options.train_batch_size),
            init_lambda: self.options.init_lambda,
            adapt_lambda: self.options.adapt_lambda,
            adapt_lr: self.options.adapt_lr,
        }
    }

    /// Lambda in effect at the end of training, used for test-time loss reporting.
    fn final_lambda(&self) -> f64 {
        let schedule = self.schedule();
        let last = self.epochs_run.max(1) - 1;
        schedule.factors(last, schedule.batches_per_epoch).lambda
    }

    /// Train for up to `max_epochs` and return the network with the lowest validation
    /// loss (the last one when there is no validation split).
    pub fn fit<B, O, C>(
        &mut self,
        mut net: AdaptNet<B>,
        optim: &mut O,
        critic_optim: &mut C,
        device: &B::Device,
    ) -> TrainResult<(AdaptNet<B>, FitReport)>
    where
        B: AutodiffBackend,
        O: Optimizer<AdaptNet<B>, B>,
        C: Optimizer<DomainNet<B>, B>,
    {
        let schedule = self.schedule();
        if schedule.batches_per_epoch == 0 {
            return Err(TrainError::Config(format!(
                "train batch size {} leaves no full batch per epoch",
                self.options.train_batch_size
            )));
        }
        let validate = self.has_split(SplitKind::Val);
        if !validate {
            tracing::warn!("no validation clips; keeping the last epoch's network");
        }
        tracing::info!(
            method = %self.adapter.method(),
            epochs = self.options.max_epochs,
            warm_up = self.options.init_epochs,
            batches = schedule.batches_per_epoch,
            "starting training"
        );

        let mut report = FitReport::default();
        let mut best: Option<AdaptNet<B>> = None;
        let mut stale = 0usize;

        for epoch in 0..self.options.max_epochs {
            let (next, train_acc) = self.train_epoch(net, optim, critic_optim, &schedule, epoch, device)?;
            net = next;
            self.epochs_run = epoch + 1;
            report.epochs_run = epoch + 1;
            let record = EpochRecord::new(epoch, &train_acc);
            self.sink.write(&record)?;
            report.history.push(record);

            if !validate {
                log_epoch(epoch, &train_acc, None);
                continue;
            }
            let lambda = schedule.factors(epoch, schedule.batches_per_epoch).lambda;
            let val_acc = self.evaluate(&net.valid(), SplitKind::Val, epoch, lambda, device)?;
            log_epoch(epoch, &train_acc, Some(&val_acc));
            report.history.push(EpochRecord::new(epoch, &val_acc));

            let val_loss = val_acc.get("total_loss").unwrap_or(f64::INFINITY);
            if report.best_val_loss.map_or(true, |b| val_loss < b) {
                report.best_val_loss = Some(val_loss);
                report.best_epoch = Some(epoch);
                stale = 0;
                if let Some(path) = &self.options.checkpoint {
                    save_checkpoint(&net, path)?;
                }
                best = Some(net.clone());
            } else {
                stale += 1;
            }
            if let Some(patience) = self.options.early_stop_patience {
                if epoch >= self.options.init_epochs && stale >= patience {
                    tracing::info!(epoch, patience, "validation loss stopped improving");
                    report.stopped_early = true;
                    break;
                }
            }
        }

        if !validate {
            if let Some(path) = &self.options.checkpoint {
                save_checkpoint(&net, path)?;
            }
        }
        Ok((best.unwrap_or(net), report))
    }

    fn train_epoch<B, O, C>(
        &mut self,
        mut net: AdaptNet<B>,
        optim: &mut O,
        critic_optim: &mut C,
        schedule: &AdaptSchedule,
        epoch: usize,
        device: &B::Device,
    ) -> TrainResult<(AdaptNet<B>, MetricsAccumulator)>
    where
        B: AutodiffBackend,
        O: Optimizer<AdaptNet<B>, B>,
        C: Optimizer<DomainNet<B>, B>,
    {
        let mut acc = MetricsAccumulator::new(SplitKind::Train);
        let pairs = self
            .data
            .batches(SplitKind::Train, self.options.train_batch_size, epoch)?;
        let critic_schedule = self.adapter.wdgrl().copied();

        for (index, pair) in pairs.iter().enumerate() {
            let factors = schedule.factors(epoch, index);
            let lr = self.options.base_lr * factors.lr_factor;
            let batch = load_pair::<B>(self.data, pair, device)?;

            let out = match &critic_schedule {
                Some(wdgrl) => {
                    let forward = wdgrl.forward(&net, &batch)?;
                    let (h_s, h_t) = forward.critic_features();
                    net = update_critic(wdgrl, net, h_s, h_t, critic_optim, lr)?;
                    wdgrl.loss_from(&net, forward, &batch)?
                }
                None => self.adapter.compute_loss(&net, &batch)?,
            };
            let loss = out.total(factors.lambda, factors.warm_up);
            acc.add_step(
                &out.metrics,
                scalar_value(out.task_loss.clone().detach()),
                scalar_value(out.adv_loss.clone().detach()),
                scalar_value(loss.clone().detach()),
            );
            let grads = GradientsParams::from_grads(loss.backward(), &net);
            net = optim.step(lr, net, grads);
            tracing::trace!(epoch, batch = index, lr, lambda = factors.lambda, "step");
        }
        Ok((net, acc))
    }

    fn has_split(&self, split: SplitKind) -> bool {
        !self.data.source_splits().get(split).is_empty()
            && !self.data.target_splits().get(split).is_empty()
    }

    /// One pass over `split` without parameter updates; the record is written to the
    /// metrics sink.
    pub fn evaluate<B: Backend>(
        &mut self,
        net: &AdaptNet<B>,
        split: SplitKind,
        epoch: usize,
        lambda: f64,
        device: &B::Device,
    ) -> TrainResult<MetricsAccumulator> {
        let mut acc = MetricsAccumulator::new(split);
        for pair in self.data.batches(split, self.options.test_batch_size, epoch)? {
            let batch: DomainBatch<B> = load_pair(self.data, &pair, device)?;
            let out = self.adapter.compute_loss(net, &batch)?;
            let total = out.total(lambda, false);
            acc.add_step(
                &out.metrics,
                scalar_value(out.task_loss),
                scalar_value(out.adv_loss),
                scalar_value(total),
            );
        }
        self.sink.write(&EpochRecord::new(epoch, &acc))?;
        Ok(acc)
    }

    pub fn test<B: Backend>(
        &mut self,
        net: &AdaptNet<B>,
        device: &B::Device,
    ) -> TrainResult<MetricsAccumulator> {
        let lambda = self.final_lambda();
        let acc = self.evaluate(net, SplitKind::Test, self.epochs_run, lambda, device)?;
        tracing::info!(
            source_acc = acc.get("source_acc").unwrap_or_default(),
            target_acc = acc.get("target_acc").unwrap_or_default(),
            domain_acc = acc.get("domain_acc"),
            "test"
        );
        Ok(acc)
    }
}

/// `k_critic` updates of the WDGRL critic on detached encoder features. The critic is
/// moved out of the network so its optimiser only ever sees the critic's parameters.
fn update_critic<B, C>(
    wdgrl: &WdgrlAdapter,
    mut net: AdaptNet<B>,
    h_s: Tensor<B, 2>,
    h_t: Tensor<B, 2>,
    optim: &mut C,
    lr: f64,
) -> TrainResult<AdaptNet<B>>
where
    B: AutodiffBackend,
    C: Optimizer<DomainNet<B>, B>,
{
    let mut critic = net.critic.take().ok_or(TrainError::MissingCritic("WDGRL"))?;
    for _ in 0..wdgrl.k_critic {
        let (cost, distance) = wdgrl.critic_cost(&critic, h_s.clone(), h_t.clone())?;
        let grads = GradientsParams::from_grads(cost.backward(), &critic);
        critic = optim.step(lr, critic, grads);
        tracing::trace!(distance, "critic step");
    }
    net.critic = Some(critic);
    Ok(net)
}

fn log_epoch(epoch: usize, train: &MetricsAccumulator, val: Option<&MetricsAccumulator>) {
    tracing::info!(
        epoch,
        loss = train.get("total_loss").unwrap_or_default(),
        source_acc = train.get("source_acc").unwrap_or_default(),
        target_acc = train.get("target_acc").unwrap_or_default(),
        val_loss = val.and_then(|v| v.get("total_loss")),
        val_target_acc = val.and_then(|v| v.get("target_acc")),
        "epoch finished"
    );
}

pub fn save_checkpoint<B: Backend>(net: &AdaptNet<B>, path: &Path) -> TrainResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| TrainError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    net.clone()
        .save_file(path.to_path_buf(), &recorder)
        .map_err(|e| TrainError::Checkpoint {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    tracing::debug!("saved checkpoint to {}", path.display());
    Ok(())
}

/// Load weights saved by [`save_checkpoint`] into a network of the same shape.
pub fn load_checkpoint<B: Backend>(
    net: AdaptNet<B>,
    path: &Path,
    device: &B::Device,
) -> TrainResult<AdaptNet<B>> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    net.load_file(path.to_path_buf(), &recorder, device)
        .map_err(|e| TrainError::Checkpoint {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}
