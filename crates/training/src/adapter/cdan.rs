use super::{
    domain_labels, forward_pair, require_critic, sum_terms, task_terms, AdaptNet, LossOutput,
};
use crate::error::TrainResult;
use crate::losses::{cross_entropy_logits, entropy_weights};
use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use models::reverse_gradient;
use video_dataset::DomainBatch;

/// Conditional adversarial adaptation: the critic sees features multiplied with the
/// class prediction, either as a full outer product or through the network's random
/// layer.
#[derive(Debug, Clone, Copy)]
pub struct CdanAdapter {
    pub alpha: f64,
    /// CDAN-E: weight each domain sample by `1 + exp(-entropy)`, normalised per side.
    pub entropy: bool,
}

impl CdanAdapter {
    pub fn new(entropy: bool) -> Self {
        Self {
            alpha: 1.0,
            entropy,
        }
    }

    pub fn compute_loss<B: Backend>(
        &self,
        net: &AdaptNet<B>,
        batch: &DomainBatch<B>,
    ) -> TrainResult<LossOutput<B>> {
        let name = if self.entropy { "CDAN-E" } else { "CDAN" };
        let critic = require_critic(net, name)?;
        let fwd = forward_pair(net, batch)?;
        let (task_loss, mut metrics) = task_terms(&fwd, batch)?;

        let p_s = reverse_gradient(softmax(fwd.y_s.clone(), 1), self.alpha);
        let p_t = reverse_gradient(softmax(fwd.y_t.clone(), 1), self.alpha);
        let (w_s, w_t) = if self.entropy {
            (
                Some(normalised_weights(fwd.y_s.clone(), self.alpha)),
                Some(normalised_weights(fwd.y_t.clone(), self.alpha)),
            )
        } else {
            (None, None)
        };

        let mut terms = Vec::with_capacity(fwd.source.len());
        for (h_s, h_t) in fwd.source.streams.iter().zip(&fwd.target.streams) {
            let f_s = reverse_gradient(h_s.clone(), self.alpha);
            let f_t = reverse_gradient(h_t.clone(), self.alpha);
            let d_s = critic.forward(condition(net, f_s, p_s.clone())?);
            let d_t = critic.forward(condition(net, f_t, p_t.clone())?);
            let device = d_s.device();
            let n_s = d_s.dims()[0];
            let n_t = d_t.dims()[0];
            let (loss_s, ok_s) = cross_entropy_logits(
                d_s,
                domain_labels::<B>(n_s, false, &device),
                w_s.clone(),
            )?;
            let (loss_t, ok_t) = cross_entropy_logits(
                d_t,
                domain_labels::<B>(n_t, true, &device),
                w_t.clone(),
            )?;
            any_correct(&mut metrics.source_domain_correct, ok_s);
            any_correct(&mut metrics.target_domain_correct, ok_t);
            terms.push(loss_s + loss_t);
        }

        Ok(LossOutput {
            task_loss,
            adv_loss: sum_terms(terms)?,
            metrics,
        })
    }
}

/// Joint streams count a domain sample as recognised when either stream gets it right.
fn any_correct(acc: &mut Vec<bool>, stream: Vec<bool>) {
    if acc.is_empty() {
        *acc = stream;
    } else {
        acc.iter_mut().zip(stream).for_each(|(a, s)| *a |= s);
    }
}

fn normalised_weights<B: Backend>(logits: Tensor<B, 2>, alpha: f64) -> Tensor<B, 1> {
    let [n, _] = logits.dims();
    let w = entropy_weights(logits, alpha);
    let total = w.clone().sum().expand([n]);
    w / total
}

/// Critic input for one stream: `[N, K * D]` outer product of probabilities and
/// features, or the random projection when the network carries one.
fn condition<B: Backend>(
    net: &AdaptNet<B>,
    feat: Tensor<B, 2>,
    probs: Tensor<B, 2>,
) -> TrainResult<Tensor<B, 2>> {
    if let Some(layer) = &net.random_layer {
        return Ok(layer.forward(&[feat, probs])?);
    }
    let [n, d] = feat.dims();
    let [_, k] = probs.dims();
    Ok(probs
        .unsqueeze_dim::<3>(2)
        .matmul(feat.unsqueeze_dim::<3>(1))
        .reshape([n, k * d]))
}
