use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which input streams a clip carries into the network.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ImageModality {
    Rgb,
    Flow,
    /// RGB and optical flow, one backbone per stream.
    Joint,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown image modality {0:?} (expected rgb, flow or joint)")]
pub struct ParseModalityError(pub String);

impl ImageModality {
    pub fn uses_rgb(self) -> bool {
        matches!(self, ImageModality::Rgb | ImageModality::Joint)
    }

    pub fn uses_flow(self) -> bool {
        matches!(self, ImageModality::Flow | ImageModality::Joint)
    }

    /// Number of backbone streams: 1 for rgb/flow, 2 for joint.
    pub fn stream_count(self) -> usize {
        match self {
            ImageModality::Joint => 2,
            _ => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImageModality::Rgb => "rgb",
            ImageModality::Flow => "flow",
            ImageModality::Joint => "joint",
        }
    }
}

impl fmt::Display for ImageModality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageModality {
    type Err = ParseModalityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rgb" => Ok(ImageModality::Rgb),
            "flow" => Ok(ImageModality::Flow),
            "joint" => Ok(ImageModality::Joint),
            _ => Err(ParseModalityError(s.to_string())),
        }
    }
}
