//! Task classifier and domain discriminator heads.

use crate::error::{ModelError, ModelResult};
use burn::module::Module;
use burn::nn::{self, BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Domain heads always emit two logits: source (0) and target (1).
pub const DOMAIN_OUTPUTS: usize = 2;

#[derive(Debug, Clone)]
pub struct ClassNetConfig {
    pub input_dim: usize,
    pub hidden: usize,
    pub num_classes: usize,
    pub dropout: f64,
}

impl ClassNetConfig {
    pub fn new(input_dim: usize, num_classes: usize) -> Self {
        Self {
            input_dim,
            hidden: 100,
            num_classes,
            dropout: 0.5,
        }
    }
}

/// Three-layer MLP classifier with batch norm and dropout between layers.
#[derive(Module, Debug)]
pub struct ClassNet<B: Backend> {
    fc1: Linear<B>,
    bn1: BatchNorm<B, 0>,
    dp1: Dropout,
    fc2: Linear<B>,
    bn2: BatchNorm<B, 0>,
    dp2: Dropout,
    fc3: Linear<B>,
}

impl<B: Backend> ClassNet<B> {
    pub fn new(cfg: &ClassNetConfig, device: &B::Device) -> Self {
        Self {
            fc1: LinearConfig::new(cfg.input_dim, cfg.hidden).init(device),
            bn1: BatchNormConfig::new(cfg.hidden).init(device),
            dp1: DropoutConfig::new(cfg.dropout).init(),
            fc2: LinearConfig::new(cfg.hidden, cfg.hidden).init(device),
            bn2: BatchNormConfig::new(cfg.hidden).init(device),
            dp2: DropoutConfig::new(cfg.dropout).init(),
            fc3: LinearConfig::new(cfg.hidden, cfg.num_classes).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.dp1.forward(relu(self.bn1.forward(self.fc1.forward(x))));
        let x = self.dp2.forward(relu(self.bn2.forward(self.fc2.forward(x))));
        self.fc3.forward(x)
    }
}

#[derive(Debug, Clone)]
pub struct DomainNetConfig {
    pub input_dim: usize,
    /// 500-100 hidden layers instead of a single 100-wide one.
    pub bigger: bool,
    pub batch_norm: bool,
}

impl DomainNetConfig {
    pub fn new(input_dim: usize) -> Self {
        Self {
            input_dim,
            bigger: false,
            batch_norm: true,
        }
    }

    pub fn with_bigger(mut self, bigger: bool) -> Self {
        self.bigger = bigger;
        self
    }

    pub fn with_batch_norm(mut self, batch_norm: bool) -> Self {
        self.batch_norm = batch_norm;
        self
    }
}

/// Binary domain discriminator, or Wasserstein critic when built without batch norm.
#[derive(Module, Debug)]
pub struct DomainNet<B: Backend> {
    fc1: Linear<B>,
    bn1: Option<BatchNorm<B, 0>>,
    fc2: Linear<B>,
    bn2: Option<BatchNorm<B, 0>>,
    fc3: Option<Linear<B>>,
}

impl<B: Backend> DomainNet<B> {
    pub fn new(cfg: &DomainNetConfig, device: &B::Device) -> Self {
        let bn = |n: usize| cfg.batch_norm.then(|| BatchNormConfig::new(n).init(device));
        if cfg.bigger {
            Self {
                fc1: LinearConfig::new(cfg.input_dim, 500).init(device),
                bn1: bn(500),
                fc2: LinearConfig::new(500, 100).init(device),
                bn2: bn(100),
                fc3: Some(LinearConfig::new(100, DOMAIN_OUTPUTS).init(device)),
            }
        } else {
            Self {
                fc1: LinearConfig::new(cfg.input_dim, 100).init(device),
                bn1: bn(100),
                fc2: LinearConfig::new(100, DOMAIN_OUTPUTS).init(device),
                bn2: None,
                fc3: None,
            }
        }
    }

    pub fn has_batch_norm(&self) -> bool {
        self.bn1.is_some() || self.bn2.is_some()
    }

    fn layers(&self) -> Vec<&Linear<B>> {
        let mut layers = vec![&self.fc1, &self.fc2];
        if let Some(fc3) = &self.fc3 {
            layers.push(fc3);
        }
        layers
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = self.fc1.forward(x);
        if let Some(bn) = &self.bn1 {
            x = bn.forward(x);
        }
        x = self.fc2.forward(relu(x));
        if let Some(fc3) = &self.fc3 {
            if let Some(bn) = &self.bn2 {
                x = bn.forward(x);
            }
            x = fc3.forward(relu(x));
        }
        x
    }

    /// Forward pass through detached weights: gradients reach `x` but not the head.
    pub fn forward_frozen(&self, x: Tensor<B, 2>) -> ModelResult<Tensor<B, 2>> {
        if self.has_batch_norm() {
            return Err(ModelError::BatchNormCritic {
                op: "frozen forward",
            });
        }
        let layers = self.layers();
        let last = layers.len() - 1;
        let mut x = x;
        for (i, layer) in layers.into_iter().enumerate() {
            x = frozen_linear(layer, x);
            if i < last {
                x = relu(x);
            }
        }
        Ok(x)
    }

    /// Gradient of `sum(forward(x))` with respect to `x`, built from ordinary ops so it
    /// stays differentiable with respect to the head's own weights.
    pub fn input_gradient(&self, x: Tensor<B, 2>) -> ModelResult<Tensor<B, 2>> {
        if self.has_batch_norm() {
            return Err(ModelError::BatchNormCritic {
                op: "input gradient",
            });
        }
        let layers = self.layers();
        let last = layers.len() - 1;
        let mut masks = Vec::with_capacity(last);
        let mut h = x;
        for layer in &layers[..last] {
            let pre = layer.forward(h);
            masks.push(pre.clone().greater_elem(0.0).float());
            h = relu(pre);
        }
        let [n, _] = h.dims();
        let mut grad = Tensor::<B, 2>::ones([n, DOMAIN_OUTPUTS], &h.device());
        for i in (0..layers.len()).rev() {
            grad = grad.matmul(layers[i].weight.val().transpose());
            if i > 0 {
                grad = grad * masks[i - 1].clone();
            }
        }
        Ok(grad)
    }
}

fn frozen_linear<B: Backend>(layer: &nn::Linear<B>, x: Tensor<B, 2>) -> Tensor<B, 2> {
    let out = x.matmul(layer.weight.val().detach());
    match &layer.bias {
        Some(bias) => out + bias.val().detach().unsqueeze::<2>(),
        None => out,
    }
}
