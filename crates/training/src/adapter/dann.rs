use super::{
    domain_labels, forward_pair, require_critic, sum_terms, task_terms, AdaptNet, LossOutput,
};
use crate::error::TrainResult;
use crate::losses::cross_entropy_logits;
use crate::method::Method;
use burn::tensor::backend::Backend;
use models::reverse_gradient;
use video_dataset::DomainBatch;

/// Domain classifier behind a gradient reversal layer, applied to each stream's
/// features. With `alpha == 0` the critic still trains but the encoder never sees its
/// gradient, which gives the source-only baseline.
#[derive(Debug, Clone, Copy)]
pub struct DannAdapter {
    pub method: Method,
    pub alpha: f64,
}

impl DannAdapter {
    pub fn new(method: Method) -> Self {
        let alpha = if method == Method::Source { 0.0 } else { 1.0 };
        Self { method, alpha }
    }

    pub fn compute_loss<B: Backend>(
        &self,
        net: &AdaptNet<B>,
        batch: &DomainBatch<B>,
    ) -> TrainResult<LossOutput<B>> {
        let critic = require_critic(net, self.method.name())?;
        let fwd = forward_pair(net, batch)?;
        let (task_loss, mut metrics) = task_terms(&fwd, batch)?;

        let mut terms = Vec::with_capacity(fwd.source.len());
        for (h_s, h_t) in fwd.source.streams.iter().zip(&fwd.target.streams) {
            let d_s = critic.forward(reverse_gradient(h_s.clone(), self.alpha));
            let d_t = critic.forward(reverse_gradient(h_t.clone(), self.alpha));
            let device = d_s.device();
            let n_s = d_s.dims()[0];
            let n_t = d_t.dims()[0];
            let (loss_s, ok_s) =
                cross_entropy_logits(d_s, domain_labels::<B>(n_s, false, &device), None)?;
            let (loss_t, ok_t) =
                cross_entropy_logits(d_t, domain_labels::<B>(n_t, true, &device), None)?;
            metrics.source_domain_correct.extend(ok_s);
            metrics.target_domain_correct.extend(ok_t);
            terms.push(loss_s + loss_t);
        }

        Ok(LossOutput {
            task_loss,
            adv_loss: sum_terms(terms)?,
            metrics,
        })
    }
}
