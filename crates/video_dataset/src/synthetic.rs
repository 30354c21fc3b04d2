//! Synthetic shifted domains for smoke runs and tests.

use crate::source::InMemoryClips;
use crate::types::{ClipSample, ClipShape, DatasetResult};
use data_contracts::ClipSplit;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

/// Generator for a labelled domain whose classes differ by colour, stripe frequency and
/// motion direction. `shift` offsets and rescales every value, mimicking a change of
/// camera or environment between domains.
#[derive(Debug, Clone)]
pub struct SyntheticDomain {
    pub domain: String,
    pub num_classes: usize,
    pub clips_per_class: usize,
    pub shape: ClipShape,
    pub shift: f32,
    pub noise: f32,
    /// Fraction of each class tagged as test clips.
    pub test_fraction: f32,
    pub seed: u64,
}

impl SyntheticDomain {
    pub fn new(domain: impl Into<String>, num_classes: usize, shape: ClipShape) -> Self {
        Self {
            domain: domain.into(),
            num_classes,
            clips_per_class: 8,
            shape,
            shift: 0.0,
            noise: 0.05,
            test_fraction: 0.25,
            seed: 0,
        }
    }

    pub fn with_shift(mut self, shift: f32) -> Self {
        self.shift = shift;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_clips_per_class(mut self, clips: usize) -> Self {
        self.clips_per_class = clips;
        self
    }

    pub fn with_test_fraction(mut self, fraction: f32) -> Self {
        self.test_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn generate(&self) -> DatasetResult<InMemoryClips> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let n_test = ((self.clips_per_class as f32) * self.test_fraction).round() as usize;
        let n_test = n_test.min(self.clips_per_class.saturating_sub(1));
        let mut samples = Vec::with_capacity(self.num_classes * self.clips_per_class);
        let mut splits = Vec::with_capacity(samples.capacity());
        for label in 0..self.num_classes {
            for k in 0..self.clips_per_class {
                samples.push(ClipSample {
                    rgb: Some(self.rgb_clip(label, &mut rng)),
                    flow: Some(self.flow_clip(label, &mut rng)),
                    label,
                });
                splits.push(if k < self.clips_per_class - n_test {
                    ClipSplit::Train
                } else {
                    ClipSplit::Test
                });
            }
        }
        InMemoryClips::with_splits(
            self.domain.clone(),
            self.shape,
            self.num_classes,
            samples,
            splits,
        )
    }

    fn jitter(&self, rng: &mut StdRng) -> f32 {
        if self.noise > 0.0 {
            rng.random_range(-self.noise..=self.noise)
        } else {
            0.0
        }
    }

    fn shifted(&self, v: f32) -> f32 {
        v * (1.0 - 0.5 * self.shift.abs()) + self.shift
    }

    fn rgb_clip(&self, label: usize, rng: &mut StdRng) -> Vec<f32> {
        let s = self.shape;
        let k = self.num_classes.max(1) as f32;
        let period = (label + 2) as f32;
        let mut buf = Vec::with_capacity(s.rgb_len());
        for c in 0..3 {
            let base = ((label * 3 + c) as f32 / (3.0 * k)) * 2.0 - 1.0;
            for t in 0..s.frames {
                for y in 0..s.height {
                    for x in 0..s.width {
                        let phase = 2.0 * PI * ((x + y + t) as f32) / period;
                        let v = 0.5 * base + 0.4 * phase.sin();
                        buf.push(self.shifted(v) + self.jitter(rng));
                    }
                }
            }
        }
        buf
    }

    fn flow_clip(&self, label: usize, rng: &mut StdRng) -> Vec<f32> {
        let s = self.shape;
        let angle = 2.0 * PI * label as f32 / self.num_classes.max(1) as f32;
        let mut buf = Vec::with_capacity(s.flow_len());
        for component in [angle.cos(), angle.sin()] {
            for t in 0..s.frames {
                let ramp = (t + 1) as f32 / s.frames.max(1) as f32;
                for _ in 0..s.volume() / s.frames.max(1) {
                    let v = 0.8 * component * ramp;
                    buf.push(self.shifted(v) + self.jitter(rng));
                }
            }
        }
        buf
    }
}
