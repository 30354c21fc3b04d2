use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use models::{compute_pad, Endpoint, InceptionI3d, InceptionI3dConfig, MaxPool3dSame, Unit3dConfig};

type B = NdArray<f32>;

fn values(t: Tensor<B, 5>) -> Vec<f32> {
    t.into_data().convert::<f32>().to_vec::<f32>().unwrap_or_default()
}

#[test]
fn same_padding_amounts() {
    assert_eq!(compute_pad(3, 1, 10), 2);
    assert_eq!(compute_pad(3, 2, 8), 1);
    assert_eq!(compute_pad(3, 2, 7), 2);
    assert_eq!(compute_pad(7, 2, 224), 5);
    assert_eq!(compute_pad(1, 2, 5), 0);
    assert_eq!(compute_pad(2, 2, 4), 0);
}

#[test]
fn endpoint_names_parse_and_reject_unknown() {
    for endpoint in Endpoint::ALL {
        assert_eq!(endpoint.name().parse::<Endpoint>().unwrap(), endpoint);
    }
    assert_eq!("mixed_5c".parse::<Endpoint>().unwrap(), Endpoint::Mixed5c);
    assert!("Mixed_6a".parse::<Endpoint>().is_err());
    assert_eq!(Endpoint::Mixed4e.out_channels(), 528);
}

#[test]
fn unit3d_keeps_size_and_rounds_up_with_stride() {
    let device = Default::default();
    let x = Tensor::<B, 5>::ones([1, 2, 3, 5, 5], &device);
    let same = Unit3dConfig::new(2, 4).with_kernel([3, 3, 3]).init::<B>(&device);
    assert_eq!(same.forward(x.clone()).dims(), [1, 4, 3, 5, 5]);
    let strided = Unit3dConfig::new(2, 4)
        .with_kernel([3, 3, 3])
        .with_stride([2, 2, 2])
        .init::<B>(&device);
    assert_eq!(strided.forward(x).dims(), [1, 4, 2, 3, 3]);
}

#[test]
fn spatial_max_pool_pads_at_the_back() {
    let device = Default::default();
    let data: Vec<f32> = (0..16).map(|v| v as f32).collect();
    let x = Tensor::<B, 5>::from_data(TensorData::new(data, [1, 1, 1, 4, 4]), &device);
    let out = MaxPool3dSame::new([1, 3, 3], [1, 2, 2]).forward(x);
    assert_eq!(out.dims(), [1, 1, 1, 2, 2]);
    assert_eq!(values(out), vec![10.0, 11.0, 14.0, 15.0]);
}

#[test]
fn temporal_max_pool() {
    let device = Default::default();
    let x = Tensor::<B, 5>::from_data(
        TensorData::new(vec![1.0f32, 5.0, 2.0, 3.0], [1, 1, 4, 1, 1]),
        &device,
    );
    let out = MaxPool3dSame::new([3, 1, 1], [2, 1, 1]).forward(x);
    assert_eq!(out.dims(), [1, 1, 2, 1, 1]);
    assert_eq!(values(out), vec![5.0, 3.0]);
}

#[test]
fn truncated_network_features() {
    let device = Default::default();
    let cfg = InceptionI3dConfig::default().with_final_endpoint(Endpoint::Mixed3b);
    let net = InceptionI3d::<B>::new(&cfg, &device);
    assert_eq!(net.feature_dim(), 256);
    let x = Tensor::<B, 5>::random(
        [2, 3, 4, 16, 16],
        burn::tensor::Distribution::Uniform(-1.0, 1.0),
        &device,
    );
    assert_eq!(net.forward_features(x.clone()).dims(), [2, 256]);
    assert!(net.forward_logits(x).is_err());
}

#[test]
fn flow_stem_accepts_two_channels() {
    let device = Default::default();
    let cfg = InceptionI3dConfig::default()
        .with_in_channels(2)
        .with_final_endpoint(Endpoint::Conv3d2b1x1);
    let net = InceptionI3d::<B>::new(&cfg, &device);
    let x = Tensor::<B, 5>::zeros([1, 2, 4, 8, 8], &device);
    assert_eq!(net.forward_features(x).dims(), [1, 64]);
}

#[test]
fn full_network_logits_and_replacement() {
    let device = Default::default();
    let cfg = InceptionI3dConfig::default().with_num_classes(7);
    let net = InceptionI3d::<B>::new(&cfg, &device);
    assert_eq!(net.feature_dim(), 1024);
    let x = Tensor::<B, 5>::zeros([1, 3, 8, 32, 32], &device);
    assert_eq!(net.forward_logits(x.clone()).unwrap().dims(), [1, 7]);

    let net = net.replace_logits(3, &device).unwrap();
    assert_eq!(net.num_classes(), 3);
    assert_eq!(net.forward_logits(x).unwrap().dims(), [1, 3]);
}
