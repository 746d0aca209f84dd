//! End-to-end scoring scenarios

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use spiral_tremor::encoder::ReportAssembler;
use spiral_tremor::{
    score_spiral_json, Metric, MetricSet, PopulationStats, ScoringArtifact, ScoringConfig,
    ScoringError, SpiralScorer, SpiralTemplate,
};
use std::f64::consts::PI;
use std::path::Path;
use tempfile::TempDir;

fn ideal_spiral(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            let theta = 4.0 * PI * i as f64 / (n - 1) as f64;
            json!({
                "x": theta * theta.cos(),
                "y": theta * theta.sin(),
                "t_ms": 10.0 * i as f64,
            })
        })
        .collect()
}

fn stats_document(mean: impl Fn(Metric) -> f64, std: f64) -> Value {
    let mut table = Map::new();
    for metric in Metric::ALL {
        table.insert(PopulationStats::mean_key(metric), json!(mean(metric)));
        table.insert(PopulationStats::std_key(metric), json!(std));
    }
    Value::Object(table)
}

fn write_stats(dir: &TempDir, name: &str, document: &Value) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, document.to_string()).unwrap();
    path
}

fn scorer() -> SpiralScorer {
    SpiralScorer::with_config(ScoringConfig {
        include_image: false,
        ..ScoringConfig::default()
    })
    .with_assembler(ReportAssembler::with_instance_id("scenario".to_string()))
}

fn unit_stats() -> PopulationStats {
    PopulationStats::from_value(&stats_document(|_| 0.0, 1.0)).unwrap()
}

#[test]
fn ideal_spiral_scores_zero_against_its_own_metrics() {
    let dir = TempDir::new().unwrap();
    let trial = json!({ "points": ideal_spiral(200) });
    let template = SpiralTemplate::new(0.0, 1.0);

    let first = scorer().score(&trial, template, &unit_stats()).unwrap();
    let metrics: MetricSet = first.metrics;
    assert!(metrics.total_time_ms > 0.0);

    let path = write_stats(&dir, "self.json", &stats_document(|m| metrics.value(m), 1.0));
    let artifact = scorer()
        .score_with_stats_file(&trial, template, &path)
        .unwrap();

    for (_, z) in artifact.scoring.z_scores.iter() {
        assert_abs_diff_eq!(*z, 0.0, epsilon = 1e-9);
    }
    assert_abs_diff_eq!(artifact.final_score(), 0.0, epsilon = 1e-9);
    assert_eq!(artifact.debug.n_points, 200);
    assert_eq!(artifact.debug.sg_window_main, 31);
    assert_eq!(artifact.debug.sg_window_jerk, 51);
}

#[test]
fn ideal_spiral_has_small_geometric_error() {
    let trial = json!({ "points": ideal_spiral(400) });
    let artifact = scorer()
        .score(&trial, SpiralTemplate::new(0.0, 1.0), &unit_stats())
        .unwrap();
    let metrics = artifact.metrics;
    assert!(metrics.geom_power.is_finite());
    assert!(metrics.temp_power.is_finite());
    assert!(metrics.jerk_proxy.is_finite());
    assert_abs_diff_eq!(metrics.total_time_ms, 3990.0, epsilon = 1e-9);
}

#[test]
fn five_samples_are_rejected() {
    let trial = json!({ "points": ideal_spiral(5) });
    let err = scorer()
        .score(&trial, SpiralTemplate::new(0.0, 1.0), &unit_stats())
        .unwrap_err();
    assert!(matches!(
        err,
        ScoringError::InsufficientSamples { count: 5, minimum: 10 }
    ));
}

#[test]
fn nine_samples_fail_and_ten_succeed() {
    let nine = json!({ "points": ideal_spiral(9) });
    let err = scorer()
        .score(&nine, SpiralTemplate::new(0.0, 1.0), &unit_stats())
        .unwrap_err();
    assert!(matches!(
        err,
        ScoringError::InsufficientSamples { count: 9, minimum: 10 }
    ));

    let ten = json!({ "points": ideal_spiral(10) });
    let artifact = scorer()
        .score(&ten, SpiralTemplate::new(0.0, 1.0), &unit_stats())
        .unwrap();
    assert_eq!(artifact.debug.n_points, 10);
    assert_eq!(artifact.debug.sg_window_main, 9);
    assert_eq!(artifact.debug.sg_window_jerk, 9);
}

#[test]
fn missing_timestamp_names_the_field() {
    let points: Vec<Value> = (0..20).map(|i| json!({ "x": i, "y": i })).collect();
    let err = scorer()
        .score(
            &json!({ "points": points }),
            SpiralTemplate::new(0.0, 1.0),
            &unit_stats(),
        )
        .unwrap_err();
    match err {
        ScoringError::MissingField { field, index, .. } => {
            assert_eq!(field, "t");
            assert_eq!(index, 0);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn nonexistent_population_file() {
    let err = score_spiral_json(
        &json!({ "points": ideal_spiral(100) }),
        SpiralTemplate::new(0.0, 1.0),
        Path::new("/definitely/not/here/popstats.json"),
        false,
    )
    .unwrap_err();
    match err {
        ScoringError::PopulationStatsNotFound { path } => {
            assert_eq!(path, Path::new("/definitely/not/here/popstats.json"))
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn scoring_is_deterministic() {
    let trial = json!({ "data": { "points": ideal_spiral(150) } });
    let template = SpiralTemplate::new(0.2, 0.9);
    let stats = PopulationStats::from_value(&stats_document(|_| 0.5, 2.0)).unwrap();

    let first = scorer().score(&trial, template, &stats).unwrap();
    let second = scorer().score(&trial, template, &stats).unwrap();

    assert_eq!(
        serde_json::to_value(&first.metrics).unwrap(),
        serde_json::to_value(&second.metrics).unwrap()
    );
    assert_eq!(
        serde_json::to_value(&first.scoring).unwrap(),
        serde_json::to_value(&second.scoring).unwrap()
    );
    assert_eq!(first.debug, second.debug);
    assert_eq!(first.final_score().to_bits(), second.final_score().to_bits());
}

#[test]
fn consecutive_duplicates_do_not_change_metrics() {
    let points = ideal_spiral(120);
    let mut doubled = Vec::with_capacity(points.len() * 2);
    for (i, point) in points.iter().enumerate() {
        doubled.push(point.clone());
        if i % 3 == 0 {
            doubled.push(point.clone());
        }
    }
    let template = SpiralTemplate::new(0.0, 1.0);

    let clean = scorer()
        .score(&json!({ "points": points }), template, &unit_stats())
        .unwrap();
    let noisy = scorer()
        .score(&json!({ "points": doubled }), template, &unit_stats())
        .unwrap();

    assert_eq!(
        serde_json::to_value(&clean.metrics).unwrap(),
        serde_json::to_value(&noisy.metrics).unwrap()
    );
    assert_eq!(noisy.debug.duplicates_removed, 40);
    assert_eq!(clean.debug.duplicates_removed, 0);
}

#[test]
fn zero_std_yields_exact_zero_scores() {
    let dir = TempDir::new().unwrap();
    let path = write_stats(&dir, "flat.json", &stats_document(|_| 3.0, 0.0));

    let artifact = scorer()
        .score_with_stats_file(
            &json!({ "points": ideal_spiral(80) }),
            SpiralTemplate::new(0.0, 1.0),
            &path,
        )
        .unwrap();
    for (_, z) in artifact.scoring.z_scores.iter() {
        assert_eq!(*z, 0.0);
    }
    assert_eq!(artifact.final_score(), 0.0);
}

#[test]
fn artifact_json_carries_every_section() {
    let dir = TempDir::new().unwrap();
    let path = write_stats(
        &dir,
        "wrapped.json",
        &json!({ "statistics": stats_document(|_| 0.0, 1.0) }),
    );

    let json = scorer()
        .score_to_json(
            &json!({ "points": ideal_spiral(60) }),
            SpiralTemplate::new(0.0, 1.0),
            &path,
        )
        .unwrap();
    let value: Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["version"], "spiral_scoring_v1");
    assert_eq!(value["producer"]["instance_id"], "scenario");
    assert!(value["metrics"].get("Total time (ms)").is_some());
    assert_eq!(
        value["scoring"]["weighted_contributions_sorted"]
            .as_array()
            .unwrap()
            .len(),
        6
    );
    assert_eq!(value["report"]["top_contributors"].as_array().unwrap().len(), 3);
    assert!(value["report"]["spiral_image_svg_base64"].is_null());
}

#[test]
fn stationary_pen_still_scores() {
    let points: Vec<Value> = (0..40)
        .map(|i| json!({ "x": 5.0, "y": 5.0, "t_ms": 10.0 * i as f64 }))
        .collect();
    let artifact = scorer()
        .score(
            &json!({ "points": points }),
            SpiralTemplate::new(0.0, 1.0),
            &unit_stats(),
        )
        .unwrap();

    let undefined = artifact.metrics.undefined();
    assert!(!undefined.is_empty());
    for metric in &undefined {
        assert_eq!(*artifact.scoring.z_scores.get(*metric), 0.0);
        assert_eq!(*artifact.scoring.weighted_contributions.get(*metric), 0.0);
    }
    assert!(artifact.final_score().is_finite());

    // Undefined metrics are written as null and read back as NaN
    let json = serde_json::to_string(&artifact).unwrap();
    let back: ScoringArtifact = serde_json::from_str(&json).unwrap();
    assert_eq!(back.metrics.undefined(), undefined);
    assert_abs_diff_eq!(back.final_score(), artifact.final_score(), epsilon = 1e-12);
    assert_eq!(back.debug, artifact.debug);
    assert_eq!(
        back.report.top_contributors.len(),
        artifact.report.top_contributors.len()
    );
}
