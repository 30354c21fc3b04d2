//! Loss functions shared by the adaptation methods.

use crate::error::{TrainError, TrainResult};
use burn::tensor::activation::{log_softmax, softmax};
use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, Int, Tensor, TensorData};
use models::{reverse_gradient, DomainNet};

/// First element of a tensor as `f64` on the host.
pub fn scalar_value<B: Backend, const D: usize>(t: Tensor<B, D>) -> f64 {
    t.into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .unwrap_or_default()
        .first()
        .copied()
        .unwrap_or(0.0) as f64
}

/// Negative log-likelihood of softmaxed `logits` against `labels`.
///
/// Returns the mean loss (or `sum(w * l) / sum(w)` when `weights` is given) and, per
/// sample, whether the argmax prediction matched.
pub fn cross_entropy_logits<B: Backend>(
    logits: Tensor<B, 2>,
    labels: Tensor<B, 1, Int>,
    weights: Option<Tensor<B, 1>>,
) -> TrainResult<(Tensor<B, 1>, Vec<bool>)> {
    let [n, _] = logits.dims();
    let [m] = labels.dims();
    if n != m || n == 0 {
        return Err(TrainError::shape(
            "cross entropy",
            format!("{n} predictions for {m} labels"),
        ));
    }
    if let Some(w) = &weights {
        if w.dims()[0] != n {
            return Err(TrainError::shape(
                "cross entropy",
                format!("{} weights for {n} samples", w.dims()[0]),
            ));
        }
    }

    let correct = logits
        .clone()
        .argmax(1)
        .reshape([n])
        .equal(labels.clone())
        .into_data()
        .to_vec::<bool>()
        .unwrap_or_default();

    let nll = log_softmax(logits, 1)
        .gather(1, labels.reshape([n, 1]))
        .reshape([n])
        .neg();
    let loss = match weights {
        None => nll.mean(),
        Some(w) => (nll * w.clone()).sum() / w.sum(),
    };
    Ok((loss, correct))
}

/// Prediction entropy per sample, `-sum(p log(p + 1e-5))`.
pub fn entropy_logits<B: Backend>(logits: Tensor<B, 2>) -> Tensor<B, 1> {
    let [n, _] = logits.dims();
    let p = softmax(logits, 1);
    (p.clone() * p.add_scalar(1e-5).log())
        .sum_dim(1)
        .reshape([n])
        .neg()
}

/// Per-sample CDAN-E weights `1 + exp(-H)`, with the entropy passed through gradient
/// reversal.
pub fn entropy_weights<B: Backend>(logits: Tensor<B, 2>, alpha: f64) -> Tensor<B, 1> {
    let entropy = reverse_gradient(entropy_logits(logits), alpha);
    entropy.neg().exp().add_scalar(1.0)
}

/// Sum of `kernel_num` Gaussian kernels over the stacked `[source; target]` samples.
///
/// Bandwidths are `sigma * mul^i / mul^(num/2)` for `i in 0..num`, where `sigma` is
/// `fix_sigma` or the mean pairwise squared distance (excluding the diagonal).
pub fn gaussian_kernel<B: Backend>(
    source: Tensor<B, 2>,
    target: Tensor<B, 2>,
    kernel_mul: f64,
    kernel_num: usize,
    fix_sigma: Option<f64>,
) -> TrainResult<Tensor<B, 2>> {
    let [ns, ds] = source.dims();
    let [nt, dt] = target.dims();
    if ds != dt {
        return Err(TrainError::shape(
            "gaussian kernel",
            format!("source width {ds} != target width {dt}"),
        ));
    }
    if kernel_num == 0 {
        return Err(TrainError::shape("gaussian kernel", "kernel_num must be positive"));
    }
    let n = ns + nt;
    if n < 2 {
        return Err(TrainError::shape("gaussian kernel", "need at least two samples"));
    }
    let total = Tensor::cat(vec![source, target], 0);
    let rows = total.clone().unsqueeze_dim::<3>(0).expand([n, n, ds]);
    let cols = total.unsqueeze_dim::<3>(1).expand([n, n, ds]);
    let l2 = (rows - cols).powf_scalar(2.0).sum_dim(2).reshape([n, n]);

    let sigma = match fix_sigma {
        Some(s) => s,
        None => scalar_value(l2.clone().detach().sum()) / (n * n - n) as f64,
    };
    let base = (sigma / kernel_mul.powi((kernel_num / 2) as i32)).max(1e-12);

    let mut kernels: Option<Tensor<B, 2>> = None;
    for i in 0..kernel_num {
        let bw = base * kernel_mul.powi(i as i32);
        let k = l2.clone().div_scalar(bw).neg().exp();
        kernels = Some(match kernels {
            None => k,
            Some(acc) => acc + k,
        });
    }
    kernels.ok_or_else(|| TrainError::shape("gaussian kernel", "no kernels"))
}

/// Linear-time MMD estimate from a `[2b, 2b]` kernel matrix over `[source; target]`.
pub fn compute_mmd_loss<B: Backend>(
    kernels: Tensor<B, 2>,
    batch_size: usize,
) -> TrainResult<Tensor<B, 1>> {
    let [rows, cols] = kernels.dims();
    if batch_size == 0 || rows != 2 * batch_size || cols != rows {
        return Err(TrainError::shape(
            "mmd",
            format!("kernel matrix {rows}x{cols} for batch size {batch_size}"),
        ));
    }
    let b = batch_size;
    let n = 2 * b;
    let mut coeff = vec![0.0f32; n * n];
    for i in 0..b {
        let (s1, s2) = (i, (i + 1) % b);
        let (t1, t2) = (s1 + b, s2 + b);
        coeff[s1 * n + s2] += 1.0;
        coeff[t1 * n + t2] += 1.0;
        coeff[s1 * n + t2] -= 1.0;
        coeff[s2 * n + t1] -= 1.0;
    }
    let coeff = Tensor::<B, 2>::from_data(TensorData::new(coeff, [n, n]), &kernels.device());
    Ok((kernels * coeff).sum().div_scalar(b as f64))
}

/// WGAN-GP penalty `mean((||grad_x critic(x)|| - 1)^2)` over random interpolates between
/// `h_s` and `h_t` plus both endpoints.
pub fn gradient_penalty<B: Backend>(
    critic: &DomainNet<B>,
    h_s: Tensor<B, 2>,
    h_t: Tensor<B, 2>,
) -> TrainResult<Tensor<B, 1>> {
    if h_s.dims() != h_t.dims() {
        return Err(TrainError::shape(
            "gradient penalty",
            format!("source {:?} vs target {:?}", h_s.dims(), h_t.dims()),
        ));
    }
    let [n, d] = h_s.dims();
    let alpha = Tensor::<B, 2>::random([n, 1], Distribution::Uniform(0.0, 1.0), &h_s.device())
        .expand([n, d]);
    let interpolates = h_s.clone() + alpha * (h_t.clone() - h_s.clone());
    let points = Tensor::cat(vec![interpolates, h_s, h_t], 0);
    let grad = critic.input_gradient(points)?;
    let norm = grad.powf_scalar(2.0).sum_dim(1).add_scalar(1e-12).sqrt();
    Ok(norm.sub_scalar(1.0).powf_scalar(2.0).mean())
}
