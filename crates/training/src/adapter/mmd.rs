use super::{forward_pair, sum_terms, task_terms, AdaptNet, LossOutput};
use crate::error::{TrainError, TrainResult};
use crate::losses::{compute_mmd_loss, gaussian_kernel, scalar_value};
use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use video_dataset::DomainBatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmdKind {
    /// Multi-kernel MMD on features.
    Dan,
    /// Joint MMD on features and class probabilities.
    Jan,
}

#[derive(Debug, Clone, Copy)]
pub struct MmdAdapter {
    pub kind: MmdKind,
    pub kernel_mul: f64,
    pub kernel_num: usize,
    /// Probability kernel of JAN: multiplier, count and fixed bandwidth.
    pub prob_kernel: (f64, usize, f64),
}

impl MmdAdapter {
    pub fn dan() -> Self {
        Self {
            kind: MmdKind::Dan,
            kernel_mul: 2.0,
            kernel_num: 5,
            prob_kernel: (2.0, 1, 1.68),
        }
    }

    pub fn jan() -> Self {
        Self {
            kind: MmdKind::Jan,
            ..Self::dan()
        }
    }

    pub fn compute_loss<B: Backend>(
        &self,
        net: &AdaptNet<B>,
        batch: &DomainBatch<B>,
    ) -> TrainResult<LossOutput<B>> {
        let fwd = forward_pair(net, batch)?;
        let (task_loss, mut metrics) = task_terms(&fwd, batch)?;

        let mut terms = Vec::with_capacity(fwd.source.len());
        for (h_s, h_t) in fwd.source.streams.iter().zip(&fwd.target.streams) {
            terms.push(self.discrepancy(
                h_s.clone(),
                h_t.clone(),
                fwd.y_s.clone(),
                fwd.y_t.clone(),
            )?);
        }
        let mmd = sum_terms(terms)?;
        metrics.mmd = Some(scalar_value(mmd.clone().detach()));
        Ok(LossOutput {
            task_loss,
            adv_loss: mmd,
            metrics,
        })
    }

    fn discrepancy<B: Backend>(
        &self,
        h_s: Tensor<B, 2>,
        h_t: Tensor<B, 2>,
        y_s: Tensor<B, 2>,
        y_t: Tensor<B, 2>,
    ) -> TrainResult<Tensor<B, 1>> {
        let b = h_s.dims()[0];
        if h_t.dims()[0] != b {
            return Err(TrainError::shape(
                "mmd",
                format!("source batch {b} != target batch {}", h_t.dims()[0]),
            ));
        }
        let kernels = gaussian_kernel(h_s, h_t, self.kernel_mul, self.kernel_num, None)?;
        let kernels = match self.kind {
            MmdKind::Dan => kernels,
            MmdKind::Jan => {
                let (mul, num, sigma) = self.prob_kernel;
                kernels
                    * gaussian_kernel(softmax(y_s, 1), softmax(y_t, 1), mul, num, Some(sigma))?
            }
        };
        compute_mmd_loss(kernels, b)
    }
}
