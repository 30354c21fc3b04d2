use std::path::PathBuf;
use thiserror::Error;
use video_dataset::DatasetError;

use models::ModelError;

pub type TrainResult<T> = Result<T, TrainError>;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("{op}: {detail}")]
    Shape { op: &'static str, detail: String },
    #[error("batch does not match the {expected} network: {detail}")]
    ModalityMismatch { expected: String, detail: String },
    #[error("unknown method {0:?}")]
    UnknownMethod(String),
    #[error("{factory} does not support method {method}")]
    WrongFamily {
        method: String,
        factory: &'static str,
    },
    #[error("{0} requires a critic network")]
    MissingCritic(&'static str),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to write metrics: {0}")]
    Metrics(#[from] serde_json::Error),
    #[error("checkpoint {path}: {message}")]
    Checkpoint { path: PathBuf, message: String },
}

impl TrainError {
    pub(crate) fn shape(op: &'static str, detail: impl Into<String>) -> Self {
        TrainError::Shape {
            op,
            detail: detail.into(),
        }
    }
}
