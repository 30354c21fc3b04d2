use burn::tensor::Tensor;
use burn_ndarray::NdArray;
use data_contracts::ImageModality;
use models::{Endpoint, VideoEncoder, VideoEncoderConfig};

type B = NdArray<f32>;

fn encoder(modality: ImageModality) -> VideoEncoder<B> {
    let cfg = VideoEncoderConfig::new(modality).with_final_endpoint(Endpoint::Conv3d2b1x1);
    VideoEncoder::new(&cfg, &Default::default()).unwrap()
}

#[test]
fn joint_encoder_fuses_rgb_then_flow() {
    let device = Default::default();
    let enc = encoder(ImageModality::Joint);
    assert_eq!(enc.modality(), ImageModality::Joint);
    assert_eq!(enc.stream_dim(), 64);
    assert_eq!(enc.fused_dim(), 128);

    let rgb = Tensor::<B, 5>::zeros([2, 3, 4, 8, 8], &device);
    let flow = Tensor::<B, 5>::ones([2, 2, 4, 8, 8], &device);
    let out = enc.encode(Some(rgb), Some(flow)).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out.fused().dims(), [2, 128]);
}

#[test]
fn single_stream_encoders() {
    let device = Default::default();
    let rgb_only = encoder(ImageModality::Rgb);
    assert_eq!(rgb_only.fused_dim(), 64);
    let x = Tensor::<B, 5>::zeros([1, 3, 4, 8, 8], &device);
    assert_eq!(rgb_only.encode(Some(x), None).unwrap().fused().dims(), [1, 64]);

    let flow_only = encoder(ImageModality::Flow);
    assert_eq!(flow_only.modality(), ImageModality::Flow);
    let x = Tensor::<B, 5>::zeros([1, 2, 4, 8, 8], &device);
    assert_eq!(flow_only.encode(None, Some(x)).unwrap().len(), 1);
}

#[test]
fn missing_stream_is_an_error() {
    let device = Default::default();
    let enc = encoder(ImageModality::Joint);
    let rgb = Tensor::<B, 5>::zeros([1, 3, 4, 8, 8], &device);
    assert!(enc.encode(Some(rgb), None).is_err());
}

#[test]
fn pretrained_weights_round_trip_through_records() {
    use burn::module::Module;
    use burn::record::{BinFileRecorder, FullPrecisionSettings};
    use models::{i3d_joint, InceptionI3d, InceptionI3dConfig, PretrainedWeights};

    let device = Default::default();
    let dir = tempfile::tempdir().unwrap();
    let weights: PretrainedWeights = "flow_imagenet".parse().unwrap();
    assert_eq!(weights.in_channels(), 2);
    let path = dir.path().join("flow_imagenet.bin");

    let cfg = InceptionI3dConfig::default().with_final_endpoint(Endpoint::Conv3d1a7x7);
    let original = InceptionI3d::<B>::new(&cfg.clone().with_in_channels(2), &device);
    original
        .clone()
        .save_file(path.clone(), &BinFileRecorder::<FullPrecisionSettings>::new())
        .unwrap();

    let path = weights.locate(dir.path()).unwrap();
    let (rgb, flow) = i3d_joint::<B>(&cfg, None, Some(Some(path.as_path())), &device).unwrap();
    assert!(rgb.is_none());
    let flow = flow.unwrap();
    let x = Tensor::<B, 5>::ones([1, 2, 2, 4, 4], &device);
    let a = original.forward_features(x.clone()).into_data().to_vec::<f32>().unwrap();
    let b = flow.forward_features(x).into_data().to_vec::<f32>().unwrap();
    assert_eq!(a, b);
}
