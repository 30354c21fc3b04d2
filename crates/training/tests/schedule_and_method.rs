use data_contracts::ImageModality;
use std::sync::Arc;
use training::{
    create_adapter, AdaptSchedule, AdaptTrainer, AdapterParams, Method, MetricsSink,
    TrainError, TrainerOptions,
};
use video_dataset::{ClipShape, MultiDomainDatasets, SizeType, SyntheticDomain, WeightType};

fn schedule() -> AdaptSchedule {
    AdaptSchedule {
        init_epochs: 2,
        adapt_epochs: 10,
        batches_per_epoch: 4,
        init_lambda: 1.0,
        adapt_lambda: true,
        adapt_lr: true,
    }
}

#[test]
fn method_names_round_trip() {
    for m in Method::ALL {
        assert_eq!(m.name().parse::<Method>().unwrap(), m);
        assert_eq!(m.to_string().to_lowercase().parse::<Method>().unwrap(), m);
    }
    assert!(matches!(
        "MCD".parse::<Method>(),
        Err(TrainError::UnknownMethod(name)) if name == "MCD"
    ));
}

#[test]
fn method_families_partition_the_methods() {
    for m in Method::ALL {
        let families = [m.is_dann_method(), m.is_cdan_method(), m.is_mmd_method()]
            .into_iter()
            .filter(|f| *f)
            .count();
        let expected = usize::from(m != Method::Wdgrl);
        assert_eq!(families, expected, "{m}");
    }
    assert!(Method::Source.is_dann_method());
    assert!(Method::CdanE.is_cdan_method());
    assert!(Method::Jan.is_mmd_method());
}

#[test]
fn warm_up_trains_task_only() {
    let s = schedule();
    for epoch in 0..2 {
        for batch in 0..4 {
            let f = s.factors(epoch, batch);
            assert!(f.warm_up);
            assert_eq!(f.grow, 0.0);
            assert_eq!(f.lambda, 0.0);
            assert_eq!(f.lr_factor, 1.0);
        }
    }
}

#[test]
fn adaptation_ramps_lambda_and_decays_lr() {
    let s = schedule();
    let start = s.factors(2, 0);
    assert!(!start.warm_up);
    assert!(start.grow.abs() < 1e-12);
    assert!((start.lr_factor - 1.0).abs() < 1e-12);

    // p = (1 + 1 * 4) / 40 = 0.125
    let f = s.factors(3, 1);
    let p: f64 = 0.125;
    let grow = 2.0 / (1.0 + (-10.0 * p).exp()) - 1.0;
    assert!((f.grow - grow).abs() < 1e-12);
    assert!((f.lambda - grow).abs() < 1e-12);
    assert!((f.lr_factor - (1.0 + 10.0 * p).powf(-0.75)).abs() < 1e-12);

    let mut last = f;
    for epoch in 4..12 {
        let next = s.factors(epoch, 0);
        assert!(next.lambda > last.lambda);
        assert!(next.lr_factor < last.lr_factor);
        assert!(next.lambda < 1.0);
        last = next;
    }
}

#[test]
fn fixed_lambda_and_lr_when_adaptation_is_off() {
    let s = AdaptSchedule {
        adapt_lambda: false,
        adapt_lr: false,
        init_lambda: 0.3,
        ..schedule()
    };
    let f = s.factors(7, 2);
    assert_eq!(f.lambda, 0.3);
    assert_eq!(f.lr_factor, 1.0);
    assert!(f.grow > 0.0);
    assert_eq!(s.factors(0, 0).lambda, 0.3);
}

#[test]
fn trainer_progress_spans_only_the_adaptation_epochs() {
    let shape = ClipShape::new(2, 4, 4);
    let domain = |name: &str, seed: u64| {
        Arc::new(
            SyntheticDomain::new(name, 2, shape)
                .with_seed(seed)
                .generate()
                .unwrap(),
        )
    };
    let data = MultiDomainDatasets::new(
        domain("s", 1),
        domain("t", 2),
        ImageModality::Rgb,
        0,
        WeightType::Natural,
        SizeType::Source,
        0.0,
    )
    .unwrap();
    let options = TrainerOptions {
        base_lr: 0.01,
        train_batch_size: 2,
        test_batch_size: 2,
        max_epochs: 12,
        init_epochs: 2,
        init_lambda: 1.0,
        adapt_lambda: true,
        adapt_lr: true,
        early_stop_patience: None,
        checkpoint: None,
    };
    let adapter = create_adapter(Method::Dann, &AdapterParams::default()).unwrap();
    let trainer = AdaptTrainer::new(adapter, &data, options, MetricsSink::disabled());
    let s = trainer.schedule();
    assert_eq!(s.adapt_epochs, 10);

    // The last batch of the last epoch sits just short of p = 1.
    let nb = s.batches_per_epoch;
    let p = (nb - 1 + 9 * nb) as f64 / (10 * nb) as f64;
    let f = s.factors(11, nb - 1);
    assert!((f.lr_factor - (1.0 + 10.0 * p).powf(-0.75)).abs() < 1e-12);
    assert!(f.lambda > 0.99);
}
