use std::path::PathBuf;
use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown I3D endpoint {0:?}")]
    UnknownEndpoint(String),
    #[error("unknown pretrained weights {0:?}")]
    UnknownWeights(String),
    #[error("endpoint {built} does not include the logits layer")]
    NoLogits { built: &'static str },
    #[error("{stream} stream expected by the encoder but missing from the input")]
    MissingStream { stream: &'static str },
    #[error("encoder has no input stream")]
    NoStreams,
    #[error("{op} requires a critic without batch normalization")]
    BatchNormCritic { op: &'static str },
    #[error("random layer expects {expected} inputs, got {actual}")]
    InputCount { expected: usize, actual: usize },
    #[error("failed to load weights from {path}: {message}")]
    Record { path: PathBuf, message: String },
    #[error("{path} has no tensor named {key}")]
    MissingWeight { path: PathBuf, key: String },
    #[error("tensor {key} has shape {actual:?}, expected {expected:?}")]
    WeightShape {
        key: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("{name} weights not found at {path}; download them from {url}")]
    WeightsNotFound {
        name: &'static str,
        path: PathBuf,
        url: &'static str,
    },
}
