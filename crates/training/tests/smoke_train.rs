use std::path::Path;
use training::util::{evaluate_checkpoint, train_with_config};
use training::ExperimentConfig;

fn tiny_config(method: &str, modality: &str, out: &Path) -> ExperimentConfig {
    let mut cfg = ExperimentConfig::default();
    cfg.dan.method = method.to_string();
    cfg.dataset.image_modality = modality.to_string();
    cfg.dataset.num_classes = 3;
    cfg.dataset.clips_per_class = 4;
    cfg.dataset.frames = 4;
    cfg.dataset.height = 16;
    cfg.dataset.width = 16;
    cfg.dataset.val_ratio = 0.2;
    cfg.solver.train_batch_size = 4;
    cfg.solver.test_batch_size = 4;
    cfg.solver.max_epochs = 2;
    cfg.solver.min_epochs = 1;
    cfg.wdgrl.k_critic = 1;
    cfg.model.final_endpoint = "Conv3d_1a_7x7".to_string();
    cfg.output.dir = out.display().to_string();
    cfg.validate().unwrap();
    cfg
}

fn metric_lines(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn dann_trains_validates_and_tests_on_synthetic_domains() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = tiny_config("DANN", "rgb", dir.path());
    let summary = train_with_config(&cfg, true).unwrap();

    assert_eq!(summary.report.epochs_run, 2);
    assert!(summary.report.best_epoch.is_some());
    assert!(summary.checkpoint.exists());
    assert!(dir.path().join("config.toml").exists());
    for key in ["Te_source_acc", "Te_target_acc", "Te_domain_acc", "Te_total_loss"] {
        let v = summary.test[key];
        assert!(v.is_finite(), "{key} = {v}");
    }

    // Two train records, two validation records and one test record.
    let lines = metric_lines(&cfg.metrics_path());
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0]["split"], "T");
    assert_eq!(lines[1]["split"], "V");
    assert_eq!(lines[4]["split"], "Te");
    assert!(lines[0].get("T_adv_loss").is_some());

    let reloaded = evaluate_checkpoint(&cfg, &summary.checkpoint, true).unwrap();
    assert_eq!(reloaded["Te_target_acc"], summary.test["Te_target_acc"]);
}

#[test]
fn wdgrl_runs_its_critic_loop_on_joint_input() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = tiny_config("WDGRL", "joint", dir.path());
    let summary = train_with_config(&cfg, true).unwrap();
    assert!(summary.test["Te_wasserstein_dist"].is_finite());
    assert!(summary.checkpoint.exists());
}

#[test]
fn mmd_methods_report_the_discrepancy() {
    for method in ["DAN", "JAN"] {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = tiny_config(method, "flow", dir.path());
        cfg.solver.kind = training::OptimizerKind::Adam;
        cfg.solver.base_lr = 1e-3;
        let summary = train_with_config(&cfg, true).unwrap();
        assert!(summary.test["Te_mmd"].is_finite(), "{method}");
        assert!(!summary.test.contains_key("Te_domain_acc"), "{method}");
    }
}

#[test]
fn cdan_with_random_layer_and_early_stopping() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = tiny_config("CDAN-E", "rgb", dir.path());
    cfg.dan.userandom = true;
    cfg.dan.random_dim = 16;
    cfg.solver.max_epochs = 3;
    cfg.solver.min_epochs = 0;
    cfg.solver.early_stop_patience = Some(1);
    let summary = train_with_config(&cfg, true).unwrap();
    assert!(summary.report.epochs_run >= 1 && summary.report.epochs_run <= 3);
    assert!(summary.test["Te_target_acc"] >= 0.0);
}
