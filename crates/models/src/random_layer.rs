use crate::error::{ModelError, ModelResult};
use burn::module::{Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, Tensor};

/// Fixed random multilinear map: `prod_i (x_i R_i) / out_dim^(1/len)`.
///
/// The matrices are stored with the model so a reloaded checkpoint projects identically,
/// but they are detached in the forward pass and never trained.
#[derive(Module, Debug)]
pub struct RandomLayer<B: Backend> {
    matrices: Vec<Param<Tensor<B, 2>>>,
    output_dim: usize,
}

impl<B: Backend> RandomLayer<B> {
    pub fn new(input_dims: &[usize], output_dim: usize, device: &B::Device) -> Self {
        let matrices = input_dims
            .iter()
            .map(|&d| {
                Param::from_tensor(Tensor::random(
                    [d, output_dim],
                    Distribution::Normal(0.0, 1.0),
                    device,
                ))
            })
            .collect();
        Self {
            matrices,
            output_dim,
        }
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn forward(&self, inputs: &[Tensor<B, 2>]) -> ModelResult<Tensor<B, 2>> {
        if inputs.len() != self.matrices.len() || inputs.is_empty() {
            return Err(ModelError::InputCount {
                expected: self.matrices.len(),
                actual: inputs.len(),
            });
        }
        let scale = (self.output_dim as f64).powf(1.0 / inputs.len() as f64);
        let mut out: Option<Tensor<B, 2>> = None;
        for (x, r) in inputs.iter().zip(&self.matrices) {
            let proj = x.clone().matmul(r.val().detach());
            out = Some(match out {
                None => proj.div_scalar(scale),
                Some(acc) => acc * proj,
            });
        }
        out.ok_or(ModelError::InputCount {
            expected: self.matrices.len(),
            actual: 0,
        })
    }
}
