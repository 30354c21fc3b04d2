use burn_ndarray::NdArray;
use data_contracts::ImageModality;
use std::sync::Arc;
use video_dataset::{
    collate, load_pair, ClipDataset, ClipSample, ClipShape, MultiDomainDatasets, SizeType,
    SplitKind, SyntheticDomain, WeightType,
};

type B = NdArray<f32>;

#[test]
fn collate_stacks_streams_for_joint_modality() {
    let shape = ClipShape::new(2, 3, 3);
    let ds = SyntheticDomain::new("d", 2, shape).generate().expect("generate");
    let samples: Vec<ClipSample> = (0..3).map(|i| ds.load(i).expect("load")).collect();
    let device = Default::default();
    let batch = collate::<B>(&samples, shape, ImageModality::Joint, &device).expect("collate");
    assert_eq!(batch.rgb.as_ref().expect("rgb").dims(), [3, 3, 2, 3, 3]);
    assert_eq!(batch.flow.as_ref().expect("flow").dims(), [3, 2, 2, 3, 3]);
    assert_eq!(batch.len(), 3);
}

#[test]
fn collate_rejects_missing_stream() {
    let shape = ClipShape::new(1, 2, 2);
    let sample = ClipSample {
        rgb: Some(vec![0.0; shape.rgb_len()]),
        flow: None,
        label: 0,
    };
    let device = Default::default();
    assert!(collate::<B>(&[sample.clone()], shape, ImageModality::Rgb, &device).is_ok());
    assert!(collate::<B>(&[sample], shape, ImageModality::Flow, &device).is_err());
    assert!(collate::<B>(&[], shape, ImageModality::Rgb, &device).is_err());
}

#[test]
fn load_pair_keeps_labels_in_order() -> anyhow::Result<()> {
    let shape = ClipShape::new(2, 4, 4);
    let source = Arc::new(SyntheticDomain::new("s", 2, shape).with_seed(3).generate()?);
    let target = Arc::new(
        SyntheticDomain::new("t", 2, shape)
            .with_shift(0.5)
            .with_seed(4)
            .generate()?,
    );
    let data = MultiDomainDatasets::new(
        source.clone(),
        target,
        ImageModality::Flow,
        11,
        WeightType::Natural,
        SizeType::Source,
        0.0,
    )?;
    let pair = data.batches(SplitKind::Train, 4, 0)?.remove(0);
    let device = Default::default();
    let batch = load_pair::<B>(&data, &pair, &device)?;
    assert!(batch.source.rgb.is_none());
    let labels = batch
        .source
        .labels
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .expect("labels");
    let expected: Vec<i64> = pair.source.iter().map(|&i| source.label(i) as i64).collect();
    assert_eq!(labels, expected);
    Ok(())
}
