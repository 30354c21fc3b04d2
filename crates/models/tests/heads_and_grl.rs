use burn::backend::Autodiff;
use burn::optim::GradientsParams;
use burn::tensor::{Distribution, Tensor};
use burn_ndarray::NdArray;
use models::{
    reverse_gradient, ClassNet, ClassNetConfig, DomainNet, DomainNetConfig, RandomLayer,
};

type ADBackend = Autodiff<NdArray<f32>>;

fn to_vec<const D: usize>(t: Tensor<NdArray<f32>, D>) -> Vec<f32> {
    t.into_data().convert::<f32>().to_vec::<f32>().unwrap_or_default()
}

#[test]
fn class_net_shape() {
    let device = Default::default();
    let net = ClassNet::<ADBackend>::new(&ClassNetConfig::new(32, 6), &device);
    let x = Tensor::<ADBackend, 2>::random([4, 32], Distribution::Default, &device);
    assert_eq!(net.forward(x).dims(), [4, 6]);
}

#[test]
fn domain_net_variants_emit_two_logits() {
    let device = Default::default();
    let x = Tensor::<ADBackend, 2>::random([3, 20], Distribution::Default, &device);
    for bigger in [false, true] {
        for batch_norm in [false, true] {
            let cfg = DomainNetConfig::new(20)
                .with_bigger(bigger)
                .with_batch_norm(batch_norm);
            let net = DomainNet::<ADBackend>::new(&cfg, &device);
            assert_eq!(net.forward(x.clone()).dims(), [3, 2]);
        }
    }
}

#[test]
fn gradient_reversal_is_identity_forward_and_negates_backward() {
    let device = Default::default();
    let x = Tensor::<ADBackend, 2>::random([2, 3], Distribution::Default, &device).require_grad();
    let y = reverse_gradient(x.clone(), 0.5);
    assert_eq!(to_vec(y.clone().inner()), to_vec(x.clone().inner()));

    let grads = y.mul_scalar(2.0).sum().backward();
    let gx = x.grad(&grads).expect("input gradient");
    for g in to_vec(gx) {
        assert!((g + 1.0).abs() < 1e-6, "expected -1, got {g}");
    }
}

#[test]
fn analytic_input_gradient_matches_autodiff() {
    let device = Default::default();
    for bigger in [false, true] {
        let cfg = DomainNetConfig::new(8)
            .with_bigger(bigger)
            .with_batch_norm(false);
        let critic = DomainNet::<ADBackend>::new(&cfg, &device);
        let x = Tensor::<ADBackend, 2>::random([5, 8], Distribution::Normal(0.0, 1.0), &device)
            .require_grad();
        let grads = critic.forward(x.clone()).sum().backward();
        let expected = to_vec(x.grad(&grads).expect("autodiff gradient"));
        let analytic = to_vec(critic.input_gradient(x).unwrap().inner());
        for (a, e) in analytic.iter().zip(&expected) {
            assert!((a - e).abs() < 1e-4, "{a} vs {e}");
        }
    }
}

#[test]
fn input_gradient_trains_the_critic() {
    let device = Default::default();
    let critic = DomainNet::<ADBackend>::new(&DomainNetConfig::new(4).with_batch_norm(false), &device);
    let x = Tensor::<ADBackend, 2>::random([6, 4], Distribution::Default, &device);
    let penalty = critic.input_gradient(x).unwrap().powf_scalar(2.0).sum();
    let grads = GradientsParams::from_grads(penalty.backward(), &critic);
    assert!(!grads.is_empty());
}

#[test]
fn critic_ops_reject_batch_norm() {
    let device = Default::default();
    let critic = DomainNet::<ADBackend>::new(&DomainNetConfig::new(4), &device);
    let x = Tensor::<ADBackend, 2>::zeros([2, 4], &device);
    assert!(critic.input_gradient(x.clone()).is_err());
    assert!(critic.forward_frozen(x).is_err());
}

#[test]
fn frozen_forward_matches_and_leaves_weights_untouched() {
    let device = Default::default();
    let critic = DomainNet::<ADBackend>::new(&DomainNetConfig::new(4).with_batch_norm(false), &device);
    let x = Tensor::<ADBackend, 2>::random([3, 4], Distribution::Default, &device).require_grad();
    let frozen = critic.forward_frozen(x.clone()).unwrap();
    let live = critic.forward(x.clone());
    for (a, b) in to_vec(frozen.clone().inner()).iter().zip(to_vec(live.inner())) {
        assert!((a - b).abs() < 1e-6);
    }
    let grads = frozen.sum().backward();
    assert!(x.grad(&grads).is_some());
    assert!(GradientsParams::from_grads(grads, &critic).is_empty());
}

#[test]
fn random_layer_projects_and_stays_fixed() {
    let device = Default::default();
    let layer = RandomLayer::<ADBackend>::new(&[6, 3], 16, &device);
    let f = Tensor::<ADBackend, 2>::random([4, 6], Distribution::Default, &device).require_grad();
    let g = Tensor::<ADBackend, 2>::random([4, 3], Distribution::Default, &device);
    let out = layer.forward(&[f.clone(), g.clone()]).unwrap();
    assert_eq!(out.dims(), [4, 16]);
    assert!(layer.forward(&[f.clone()]).is_err());

    let grads = out.sum().backward();
    assert!(f.grad(&grads).is_some());
    assert!(GradientsParams::from_grads(grads, &layer).is_empty());
}
