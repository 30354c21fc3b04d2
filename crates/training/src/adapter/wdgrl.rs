use super::{forward_pair, require_critic, task_terms, AdaptNet, Forwarded, LossOutput};
use crate::error::TrainResult;
use crate::losses::{cross_entropy_logits, gradient_penalty, scalar_value};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use models::DomainNet;
use video_dataset::DomainBatch;

/// Wasserstein distance guided representation learning. The critic is trained in its
/// own inner loop (`critic_cost`); the main step only reads it.
#[derive(Debug, Clone, Copy)]
pub struct WdgrlAdapter {
    /// Critic updates per training batch.
    pub k_critic: usize,
    /// Gradient penalty weight.
    pub gamma: f64,
    /// Target term is scaled by `1 + beta_ratio`.
    pub beta_ratio: f64,
}

/// One encoder and classifier pass, shared by the critic loop and the main loss.
pub struct WdgrlForward<B: Backend> {
    fwd: Forwarded<B>,
}

impl<B: Backend> WdgrlForward<B> {
    /// Detached fused features for the critic's inner loop.
    pub fn critic_features(&self) -> (Tensor<B, 2>, Tensor<B, 2>) {
        (
            self.fwd.source.fused().detach(),
            self.fwd.target.fused().detach(),
        )
    }
}

impl WdgrlAdapter {
    pub fn forward<B: Backend>(
        &self,
        net: &AdaptNet<B>,
        batch: &DomainBatch<B>,
    ) -> TrainResult<WdgrlForward<B>> {
        Ok(WdgrlForward {
            fwd: forward_pair(net, batch)?,
        })
    }

    pub fn compute_loss<B: Backend>(
        &self,
        net: &AdaptNet<B>,
        batch: &DomainBatch<B>,
    ) -> TrainResult<LossOutput<B>> {
        let forward = self.forward(net, batch)?;
        self.loss_from(net, forward, batch)
    }

    /// Main-step loss on an earlier forward pass, read through the current critic.
    pub fn loss_from<B: Backend>(
        &self,
        net: &AdaptNet<B>,
        forward: WdgrlForward<B>,
        batch: &DomainBatch<B>,
    ) -> TrainResult<LossOutput<B>> {
        let critic = require_critic(net, "WDGRL")?;
        let fwd = forward.fwd;
        let (task_loss, mut metrics) = task_terms(&fwd, batch)?;

        let d_s = critic.forward_frozen(fwd.source.fused())?;
        let d_t = critic.forward_frozen(fwd.target.fused())?;
        let device = d_s.device();
        let n_s = d_s.dims()[0];
        let n_t = d_t.dims()[0];
        let (_, ok_s) = cross_entropy_logits(
            d_s.clone().detach(),
            Tensor::<B, 1, Int>::zeros([n_s], &device),
            None,
        )?;
        let (_, ok_t) = cross_entropy_logits(
            d_t.clone().detach(),
            Tensor::<B, 1, Int>::ones([n_t], &device),
            None,
        )?;
        metrics.source_domain_correct = ok_s;
        metrics.target_domain_correct = ok_t;

        let w = self.wasserstein(d_s, d_t);
        metrics.wasserstein = Some(scalar_value(w.clone().detach()));
        Ok(LossOutput {
            task_loss,
            adv_loss: w,
            metrics,
        })
    }

    fn wasserstein<B: Backend>(&self, d_s: Tensor<B, 2>, d_t: Tensor<B, 2>) -> Tensor<B, 1> {
        d_s.mean() - d_t.mean().mul_scalar(1.0 + self.beta_ratio)
    }

    /// Critic objective `-W + gamma * GP`, returned with the distance `W` it measured.
    pub fn critic_cost<B: Backend>(
        &self,
        critic: &DomainNet<B>,
        h_s: Tensor<B, 2>,
        h_t: Tensor<B, 2>,
    ) -> TrainResult<(Tensor<B, 1>, f64)> {
        let gp = gradient_penalty(critic, h_s.clone(), h_t.clone())?;
        let w = self.wasserstein(critic.forward(h_s), critic.forward(h_t));
        let distance = scalar_value(w.clone().detach());
        Ok((w.neg() + gp.mul_scalar(self.gamma), distance))
    }
}
