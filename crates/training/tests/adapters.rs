use burn::backend::Autodiff;
use burn::module::AutodiffModule;
use burn::optim::GradientsParams;
use burn::tensor::{Distribution, Int, Tensor, TensorData};
use burn_ndarray::NdArray;
use data_contracts::ImageModality;
use models::Endpoint;
use training::adapter::{create_adapter, AdapterParams};
use training::losses::scalar_value;
use training::{
    build_adapt_net, create_dann_like, create_mmd_based, AdaptNet, Adapter, Method, NetSpec,
    TrainError,
};
use video_dataset::{DomainBatch, ModalBatch};

type ADBackend = Autodiff<NdArray<f32>>;

const CLASSES: usize = 3;

fn spec(modality: ImageModality) -> NetSpec {
    NetSpec {
        modality,
        final_endpoint: Endpoint::Conv3d1a7x7,
        num_classes: CLASSES,
        rgb_weights: None,
        flow_weights: None,
        random_dim: None,
    }
}

fn side(modality: ImageModality, n: usize, shift: f64) -> ModalBatch<ADBackend> {
    let device = Default::default();
    let clip = |channels: usize| {
        Tensor::<ADBackend, 5>::random([n, channels, 4, 8, 8], Distribution::Default, &device)
            .add_scalar(shift)
    };
    let labels: Vec<i64> = (0..n as i64).map(|i| i % CLASSES as i64).collect();
    ModalBatch {
        rgb: modality.uses_rgb().then(|| clip(3)),
        flow: modality.uses_flow().then(|| clip(2)),
        labels: Tensor::<ADBackend, 1, Int>::from_data(TensorData::new(labels, [n]), &device),
    }
}

fn batch(modality: ImageModality, n: usize) -> DomainBatch<ADBackend> {
    DomainBatch {
        source: side(modality, n, 0.0),
        target: side(modality, n, 0.5),
    }
}

fn net(method: Method, spec: &NetSpec) -> AdaptNet<ADBackend> {
    build_adapt_net::<ADBackend>(method, spec, &Default::default()).unwrap()
}

fn adapter(method: Method) -> Adapter {
    create_adapter(method, &AdapterParams::default()).unwrap()
}

#[test]
fn factories_reject_the_other_family() {
    for m in Method::ALL {
        let params = AdapterParams::default();
        assert_eq!(create_dann_like(m, &params).is_ok(), !m.is_mmd_method(), "{m}");
        assert_eq!(create_mmd_based(m).is_ok(), m.is_mmd_method(), "{m}");
        assert_eq!(create_adapter(m, &params).unwrap().method(), m);
    }
    assert!(matches!(
        create_mmd_based(Method::Dann),
        Err(TrainError::WrongFamily { factory: "create_mmd_based", .. })
    ));
}

#[test]
fn critic_input_sizes_follow_the_method() {
    let rgb = spec(ImageModality::Rgb);
    let joint = spec(ImageModality::Joint);
    assert!(net(Method::Dan, &rgb).critic.is_none());
    assert!(net(Method::Jan, &joint).critic.is_none());

    let dann = net(Method::Dann, &joint);
    let critic = dann.critic.as_ref().unwrap();
    assert!(critic.has_batch_norm());
    let h = Tensor::<ADBackend, 2>::zeros([2, 64], &Default::default());
    assert_eq!(critic.forward(h).dims(), [2, 2]);

    let wdgrl = net(Method::Wdgrl, &joint);
    let critic = wdgrl.critic.as_ref().unwrap();
    assert!(!critic.has_batch_norm());
    let h = Tensor::<ADBackend, 2>::zeros([2, 128], &Default::default());
    assert_eq!(critic.forward(h).dims(), [2, 2]);

    let cdan = net(Method::Cdan, &rgb);
    assert!(cdan.random_layer.is_none());
    let h = Tensor::<ADBackend, 2>::zeros([2, 64 * CLASSES], &Default::default());
    assert_eq!(cdan.critic.as_ref().unwrap().forward(h).dims(), [2, 2]);

    let random = NetSpec {
        random_dim: Some(32),
        ..spec(ImageModality::Rgb)
    };
    let cdan = net(Method::CdanE, &random);
    assert_eq!(cdan.random_layer.as_ref().unwrap().output_dim(), 32);
}

#[test]
fn every_method_produces_finite_losses() {
    let n = 4;
    for m in Method::ALL {
        let spec = spec(ImageModality::Rgb);
        let net = net(m, &spec);
        let out = adapter(m).compute_loss(&net, &batch(ImageModality::Rgb, n)).unwrap();
        let task = scalar_value(out.task_loss.clone());
        let adv = scalar_value(out.adv_loss.clone());
        assert!(task.is_finite() && task > 0.0, "{m} task {task}");
        assert!(adv.is_finite(), "{m} adv {adv}");
        assert_eq!(out.metrics.source_correct.len(), n);
        assert_eq!(out.metrics.target_correct.len(), n);
        match m {
            Method::Dan | Method::Jan => {
                assert!(out.metrics.mmd.is_some());
                assert!(out.metrics.source_domain_correct.is_empty());
            }
            Method::Wdgrl => {
                let w = out.metrics.wasserstein.unwrap();
                assert!((w - adv).abs() < 1e-6);
                assert_eq!(out.metrics.source_domain_correct.len(), n);
            }
            _ => {
                assert!(adv > 0.0, "{m} adversarial loss {adv}");
                assert_eq!(out.metrics.target_domain_correct.len(), n);
            }
        }
    }
}

#[test]
fn joint_streams_each_reach_the_domain_classifier() {
    let n = 3;
    let dann = net(Method::Dann, &spec(ImageModality::Joint));
    let out = adapter(Method::Dann)
        .compute_loss(&dann, &batch(ImageModality::Joint, n))
        .unwrap();
    assert_eq!(out.metrics.source_domain_correct.len(), 2 * n);
    assert_eq!(out.metrics.target_domain_correct.len(), 2 * n);

    for m in [Method::Cdan, Method::CdanE] {
        let net = net(m, &spec(ImageModality::Joint));
        let out = adapter(m).compute_loss(&net, &batch(ImageModality::Joint, n)).unwrap();
        assert_eq!(out.metrics.source_domain_correct.len(), n, "{m}");
        assert_eq!(out.metrics.target_domain_correct.len(), n, "{m}");
    }
    let net = net(Method::Wdgrl, &spec(ImageModality::Joint));
    let out = adapter(Method::Wdgrl)
        .compute_loss(&net, &batch(ImageModality::Joint, n))
        .unwrap();
    assert_eq!(out.metrics.source_domain_correct.len(), n);
}

#[test]
fn batch_streams_must_match_the_network() {
    let rgb_net = net(Method::Dann, &spec(ImageModality::Rgb));
    let joint_batch = batch(ImageModality::Joint, 2);
    assert!(matches!(
        adapter(Method::Dann).compute_loss(&rgb_net, &joint_batch),
        Err(TrainError::ModalityMismatch { .. })
    ));

    let joint_net = net(Method::Dan, &spec(ImageModality::Joint));
    let flow_batch = batch(ImageModality::Flow, 2);
    assert!(matches!(
        adapter(Method::Dan).compute_loss(&joint_net, &flow_batch),
        Err(TrainError::ModalityMismatch { .. })
    ));
}

#[test]
fn methods_with_a_critic_fail_without_one() {
    let mmd_net = net(Method::Dan, &spec(ImageModality::Rgb));
    let err = adapter(Method::Dann)
        .compute_loss(&mmd_net, &batch(ImageModality::Rgb, 2))
        .unwrap_err();
    assert!(matches!(err, TrainError::MissingCritic(_)));
}

#[test]
fn total_loss_ignores_the_domain_term_during_warm_up() {
    let net = net(Method::Dann, &spec(ImageModality::Rgb));
    let out = adapter(Method::Dann)
        .compute_loss(&net, &batch(ImageModality::Rgb, 4))
        .unwrap();
    let task = scalar_value(out.task_loss.clone());
    let adv = scalar_value(out.adv_loss.clone());
    assert!((scalar_value(out.total(0.7, true)) - task).abs() < 1e-6);
    assert!((scalar_value(out.total(0.7, false)) - (task + 0.7 * adv)).abs() < 1e-5);
}

#[test]
fn wdgrl_main_step_leaves_the_critic_untouched() {
    let net = net(Method::Wdgrl, &spec(ImageModality::Rgb));
    let out = adapter(Method::Wdgrl)
        .compute_loss(&net, &batch(ImageModality::Rgb, 4))
        .unwrap();
    let grads = out.total(1.0, false).backward();
    let critic = net.critic.as_ref().unwrap();
    assert!(GradientsParams::from_grads(grads, critic).is_empty());
}

#[test]
fn wdgrl_critic_cost_reaches_only_the_critic() {
    let net = net(Method::Wdgrl, &spec(ImageModality::Rgb));
    let wdgrl = *adapter(Method::Wdgrl).wdgrl().unwrap();
    let (h_s, h_t) = wdgrl
        .forward(&net, &batch(ImageModality::Rgb, 4))
        .unwrap()
        .critic_features();
    assert_eq!(h_s.dims(), [4, 64]);
    let critic = net.critic.as_ref().unwrap();
    let (cost, distance) = wdgrl.critic_cost(critic, h_s, h_t).unwrap();
    assert!(distance.is_finite());
    let grads = cost.backward();
    assert!(!GradientsParams::from_grads(grads, critic).is_empty());
}

#[test]
fn wdgrl_loss_reuses_the_forward_that_fed_the_critic() {
    let net = net(Method::Wdgrl, &spec(ImageModality::Joint));
    let wdgrl = *adapter(Method::Wdgrl).wdgrl().unwrap();
    let batch = batch(ImageModality::Joint, 4);
    let forward = wdgrl.forward(&net, &batch).unwrap();
    let (h_s, _) = forward.critic_features();
    assert_eq!(h_s.dims(), [4, 128]);

    let reused = wdgrl.loss_from(&net, forward, &batch).unwrap();
    let fresh = wdgrl.compute_loss(&net, &batch).unwrap();
    let a = scalar_value(reused.adv_loss.clone());
    let b = scalar_value(fresh.adv_loss);
    assert!((a - b).abs() < 1e-5, "{a} vs {b}");

    // Encoder and classifier still receive gradients through the shared pass.
    let grads = reused.total(1.0, false).backward();
    assert!(!GradientsParams::from_grads(grads, &net.classifier).is_empty());
}

#[test]
fn losses_evaluate_on_the_inference_network() {
    let net = net(Method::CdanE, &spec(ImageModality::Rgb)).valid();
    let device = Default::default();
    let labels = Tensor::<NdArray<f32>, 1, Int>::from_data(
        TensorData::new(vec![0i64, 1], [2]),
        &device,
    );
    let side = |shift: f64| ModalBatch {
        rgb: Some(
            Tensor::<NdArray<f32>, 5>::random([2, 3, 4, 8, 8], Distribution::Default, &device)
                .add_scalar(shift),
        ),
        flow: None,
        labels: labels.clone(),
    };
    let batch = DomainBatch {
        source: side(0.0),
        target: side(1.0),
    };
    let out = adapter(Method::CdanE).compute_loss(&net, &batch).unwrap();
    assert!(scalar_value(out.adv_loss).is_finite());
}
