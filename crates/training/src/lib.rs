#![recursion_limit = "256"]
//! Domain-adaptation training for video action recognition: per-method losses, the
//! adaptation schedule, the epoch loop and the `train`/`eval` command-line surface.

pub mod adapter;
pub mod config;
pub mod error;
pub mod losses;
pub mod method;
pub mod metrics;
pub mod schedule;
pub mod trainer;
pub mod util;

pub use adapter::{
    build_adapt_net, create_adapter, create_dann_like, create_mmd_based, AdaptNet, Adapter,
    AdapterParams, LossOutput, NetSpec,
};
pub use config::{ExperimentConfig, OptimizerKind, CONFIG_ENV};
pub use error::{TrainError, TrainResult};
pub use method::Method;
pub use metrics::{EpochRecord, MetricsAccumulator, MetricsSink, StepMetrics};
pub use schedule::{AdaptSchedule, ScheduleFactors};
pub use trainer::{AdaptTrainer, FitReport, TrainerOptions};
pub use util::{run_eval, run_train, ADBackend, EvalArgs, TrainArgs, TrainBackend};
