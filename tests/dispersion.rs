use std::fs;

use ferrite_centers::{
    CenterLossConfig, CenterLossError, DispersionConfig, DispersionOutcome, HeatmapVisualizer,
    NoopVisualizer,
};
use tempfile::tempdir;

#[test]
fn dispersion_returns_and_writes_debug_artefacts() {
    let dir = tempdir().unwrap();
    let base = dir.path();
    let mut cl = CenterLossConfig { num_classes: 6, feat_dim: 4, alpha: 0.01, seed: Some(21) }
        .build()
        .unwrap();
    let config = DispersionConfig {
        factors: 2,
        rounds_per_factor: 2,
        minibatch_size: 4,
        ..DispersionConfig::new(base)
    };

    let outcome = cl.disperse(&config, &mut HeatmapVisualizer).unwrap();

    let report = match outcome {
        DispersionOutcome::Completed(report) => report,
        other => panic!("expected a completed dispersion, got {other:?}"),
    };
    assert_eq!(report.rounds, 4);
    assert_eq!(report.last_update, 4);
    assert_eq!(cl.nupdate(), 4);

    for i in 0..cl.num_classes() {
        assert!((cl.centers().row_norm(i) - 1.0).abs() < 1e-9);
    }

    for (factor_dir, n) in [("centers_factor1", 1), ("centers_factor1", 2), ("centers_factor3", 3), ("centers_factor3", 4)] {
        let root = base.join("debug").join(factor_dir);
        for stage in ["before", "update", "after"] {
            assert!(root.join(stage).join(n.to_string()).join("centers.png").is_file(), "{stage}/{n}");
        }
        let text = fs::read_to_string(root.join("update").join(n.to_string()).join("report.txt")).unwrap();
        assert!(text.starts_with("max: "), "{text}");
        assert!(text.contains(" - min: "), "{text}");
    }

    let last = fs::read_to_string(base.join("debug/centers_factor3/update/4/report.txt")).unwrap();
    let expected = format!(
        "max: {} - min: {}",
        report.update_max.unwrap(),
        report.update_min.unwrap()
    );
    assert_eq!(last, expected);
}

#[test]
fn nupdate_keeps_counting_across_calls() {
    let dir = tempdir().unwrap();
    let mut cl = CenterLossConfig { num_classes: 3, feat_dim: 2, alpha: 0.01, seed: Some(2) }
        .build()
        .unwrap();
    let config = DispersionConfig { factors: 1, rounds_per_factor: 3, ..DispersionConfig::new(dir.path()) };

    cl.disperse(&config, &mut NoopVisualizer).unwrap();
    cl.disperse(&config, &mut HeatmapVisualizer).unwrap();

    assert_eq!(cl.nupdate(), 6);
    let updates = dir.path().join("debug/centers_factor1/update");
    assert!(!updates.join("3").exists());
    assert!(updates.join("4/report.txt").is_file());
    assert!(updates.join("6/report.txt").is_file());
}

#[test]
fn unwritable_base_dir_surfaces_an_io_error() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, b"plain file").unwrap();

    let mut cl = CenterLossConfig { num_classes: 4, feat_dim: 3, alpha: 0.01, seed: Some(4) }
        .build()
        .unwrap();
    let before = cl.centers().clone();
    let config = DispersionConfig { factors: 1, rounds_per_factor: 3, ..DispersionConfig::new(&blocker) };

    let err = cl.disperse(&config, &mut HeatmapVisualizer).unwrap_err();

    assert!(matches!(err, CenterLossError::Io(_)), "{err}");
    assert_eq!(cl.nupdate(), 1);
    assert_eq!(cl.centers(), &before);
}

#[test]
fn invalid_minibatch_size_is_rejected_before_any_round() {
    let dir = tempdir().unwrap();
    let mut cl = CenterLossConfig { num_classes: 3, feat_dim: 2, alpha: 0.01, seed: Some(2) }
        .build()
        .unwrap();
    let before = cl.centers().clone();
    let config = DispersionConfig { minibatch_size: 0, ..DispersionConfig::new(dir.path()) };
    assert!(cl.disperse(&config, &mut NoopVisualizer).is_err());
    assert_eq!(cl.centers(), &before);
    assert_eq!(cl.nupdate(), 0);
}
