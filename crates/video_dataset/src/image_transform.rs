//! Image-stack preprocessing: masking, rescaling and landmark registration.
//!
//! A stack holds `samples` subjects, each with `phases` grayscale images of
//! `height x width` (e.g. the frames of a gait cycle).

use crate::types::{DatasetError, DatasetResult};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};

#[derive(Debug, Clone, PartialEq)]
pub struct ImageStack {
    pub height: usize,
    pub width: usize,
    pub phases: usize,
    pub samples: usize,
    /// Row-major images, ordered sample-major then phase.
    pub data: Vec<f32>,
}

impl ImageStack {
    pub fn new(
        height: usize,
        width: usize,
        phases: usize,
        samples: usize,
        data: Vec<f32>,
    ) -> DatasetResult<Self> {
        let expected = height * width * phases * samples;
        if data.len() != expected {
            return Err(DatasetError::BufferLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            height,
            width,
            phases,
            samples,
            data,
        })
    }

    pub fn zeros(height: usize, width: usize, phases: usize, samples: usize) -> Self {
        Self {
            height,
            width,
            phases,
            samples,
            data: vec![0.0; height * width * phases * samples],
        }
    }

    fn plane(&self) -> usize {
        self.height * self.width
    }

    fn offset(&self, phase: usize, sample: usize) -> usize {
        (sample * self.phases + phase) * self.plane()
    }

    pub fn image(&self, phase: usize, sample: usize) -> &[f32] {
        let start = self.offset(phase, sample);
        &self.data[start..start + self.plane()]
    }

    pub fn image_mut(&mut self, phase: usize, sample: usize) -> &mut [f32] {
        let start = self.offset(phase, sample);
        let plane = self.plane();
        &mut self.data[start..start + plane]
    }

    pub fn get(&self, y: usize, x: usize, phase: usize, sample: usize) -> f32 {
        self.image(phase, sample)[y * self.width + x]
    }
}

/// Zero every pixel where `mask` is zero. `mask` is `height x width`, row-major.
pub fn mask_img_stack(stack: &ImageStack, mask: &[u8]) -> DatasetResult<ImageStack> {
    if mask.len() != stack.plane() {
        return Err(DatasetError::BufferLength {
            expected: stack.plane(),
            actual: mask.len(),
        });
    }
    let mut out = stack.clone();
    for chunk in out.data.chunks_mut(stack.plane()) {
        for (px, &m) in chunk.iter_mut().zip(mask) {
            if m == 0 {
                *px = 0.0;
            }
        }
    }
    Ok(out)
}

/// Downscale every image by `scale`; output is `round(h / scale) x round(w / scale)`.
pub fn rescale_img_stack(stack: &ImageStack, scale: f32) -> DatasetResult<ImageStack> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(DatasetError::Other(format!("invalid rescale factor {scale}")));
    }
    let new_h = ((stack.height as f32 / scale).round() as usize).max(1);
    let new_w = ((stack.width as f32 / scale).round() as usize).max(1);
    let mut out = ImageStack::zeros(new_h, new_w, stack.phases, stack.samples);
    for sample in 0..stack.samples {
        for phase in 0..stack.phases {
            let src: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_raw(
                stack.width as u32,
                stack.height as u32,
                stack.image(phase, sample).to_vec(),
            )
            .ok_or_else(|| DatasetError::Other("image buffer size mismatch".into()))?;
            let resized = imageops::resize(&src, new_w as u32, new_h as u32, FilterType::Triangle);
            out.image_mut(phase, sample)
                .copy_from_slice(resized.as_raw().as_slice());
        }
    }
    Ok(out)
}

/// Similarity transform `z -> a z + b` over complex coordinates.
#[derive(Debug, Clone, Copy)]
struct Similarity {
    a: (f32, f32),
    b: (f32, f32),
}

impl Similarity {
    /// Map that sends `from[i]` onto `to[i]` for both landmarks.
    fn estimate(from: [(f32, f32); 2], to: [(f32, f32); 2]) -> Option<Self> {
        let dz = (from[1].0 - from[0].0, from[1].1 - from[0].1);
        let dw = (to[1].0 - to[0].0, to[1].1 - to[0].1);
        let denom = dz.0 * dz.0 + dz.1 * dz.1;
        if denom <= f32::EPSILON {
            return None;
        }
        // a = dw / dz
        let a = (
            (dw.0 * dz.0 + dw.1 * dz.1) / denom,
            (dw.1 * dz.0 - dw.0 * dz.1) / denom,
        );
        let az0 = (a.0 * from[0].0 - a.1 * from[0].1, a.0 * from[0].1 + a.1 * from[0].0);
        let b = (to[0].0 - az0.0, to[0].1 - az0.1);
        Some(Self { a, b })
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a.0 * x - self.a.1 * y + self.b.0,
            self.a.0 * y + self.a.1 * x + self.b.1,
        )
    }
}

fn bilinear(img: &[f32], width: usize, height: usize, x: f32, y: f32) -> f32 {
    if x < 0.0 || y < 0.0 || x > (width - 1) as f32 || y > (height - 1) as f32 {
        return 0.0;
    }
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let top = img[y0 * width + x0] * (1.0 - fx) + img[y0 * width + x1] * fx;
    let bottom = img[y1 * width + x0] * (1.0 - fx) + img[y1 * width + x1] * fx;
    top * (1.0 - fy) + bottom * fy
}

fn landmarks(c: [f32; 4]) -> [(f32, f32); 2] {
    [(c[0], c[1]), (c[2], c[3])]
}

/// Register every sample onto `target` landmarks (`[x1, y1, x2, y2]`, default: the
/// first sample's). Returns the warped stack and, per sample, the largest distance
/// between its landmarks and the target's.
pub fn reg_img_stack(
    stack: &ImageStack,
    coords: &[[f32; 4]],
    target: Option<[f32; 4]>,
) -> DatasetResult<(ImageStack, Vec<f32>)> {
    if coords.len() != stack.samples {
        return Err(DatasetError::Other(format!(
            "{} landmark rows for {} samples",
            coords.len(),
            stack.samples
        )));
    }
    if stack.samples == 0 {
        return Ok((stack.clone(), Vec::new()));
    }
    let target = target.unwrap_or(coords[0]);
    let dst = landmarks(target);
    let mut out = stack.clone();
    let mut max_dist = Vec::with_capacity(stack.samples);
    for (sample, row) in coords.iter().enumerate() {
        let src = landmarks(*row);
        let dist = src
            .iter()
            .zip(dst.iter())
            .map(|(p, q)| ((p.0 - q.0).powi(2) + (p.1 - q.1).powi(2)).sqrt())
            .fold(0.0f32, f32::max);
        max_dist.push(dist);
        // Output pixels live in the target frame; sample them from the source frame.
        let back = Similarity::estimate(dst, src).ok_or_else(|| {
            DatasetError::Other(format!("sample {sample}: degenerate landmarks {row:?}"))
        })?;
        for phase in 0..stack.phases {
            let img = stack.image(phase, sample);
            let warped = out.image_mut(phase, sample);
            for y in 0..stack.height {
                for x in 0..stack.width {
                    let (sx, sy) = back.apply(x as f32, y as f32);
                    warped[y * stack.width + x] = bilinear(img, stack.width, stack.height, sx, sy);
                }
            }
        }
    }
    Ok((out, max_dist))
}
