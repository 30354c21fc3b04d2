use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Identity in the forward pass; scales the incoming gradient by `-alpha`.
///
/// Built from a detached copy so it works on any autodiff backend without a custom op:
/// `y = d + alpha * (d - x)` where `d = detach(x)`, hence `y == x` and `dy/dx = -alpha`.
pub fn reverse_gradient<B: Backend, const D: usize>(x: Tensor<B, D>, alpha: f64) -> Tensor<B, D> {
    let frozen = x.clone().detach();
    frozen.clone() + (frozen - x).mul_scalar(alpha)
}
