//! Integration tests for the training pipeline
//!
//! Ensures identical models are produced across runs and that the persisted
//! artifact is what later predictions are made from.

use anyhow::Result;
use exo_dataset::{derive_features, read_csv, Dataset};
use exo_trainer::serialization::canonical_json_string;
use exo_trainer::{
    GbdtConfig, ModelArtifact, TrainerError, TrainingPipeline, TuneRequest, MIN_TRAIN_ROWS,
};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

/// Synthetic candidates: large planets around small stars are labelled 1.
fn create_synthetic_dataset(rows: usize) -> Result<Dataset> {
    let mut file = NamedTempFile::new()?;

    writeln!(
        file,
        "orbital_period,transit_duration,planet_radius,stellar_radius,koi_model_snr,target"
    )?;
    for i in 0..rows {
        let positive = i % 2 == 0;
        let planet_radius = if positive { 8.0 + i as f64 } else { 1.0 + i as f64 / 10.0 };
        writeln!(
            file,
            "{},{},{},{},{},{}",
            10.0 + i as f64,
            2.5,
            planet_radius,
            1.0,
            if positive { 40.0 } else { 7.5 },
            u8::from(positive)
        )?;
    }

    file.flush()?;
    Ok(read_csv(file.reopen()?)?)
}

fn pipeline(dir: &TempDir) -> TrainingPipeline {
    TrainingPipeline::new(dir.path().join("model.json"), GbdtConfig::default())
}

#[test]
fn test_ten_rows_split_eight_two() -> Result<()> {
    let dir = TempDir::new()?;
    let dataset = create_synthetic_dataset(10)?;

    let outcome = pipeline(&dir).train(&dataset, true)?;

    assert_eq!(outcome.result.n_train, 8);
    assert_eq!(outcome.result.n_val, 2);
    assert!((0.0..=1.0).contains(&outcome.result.accuracy));
    assert!(dir.path().join("model.json").exists(), "model should be persisted");

    // Raw columns first, then every derived column whose operands exist.
    assert_eq!(
        outcome.result.features,
        vec![
            "orbital_period",
            "transit_duration",
            "planet_radius",
            "stellar_radius",
            "koi_model_snr",
            "radius_ratio",
            "duration_period_ratio",
            "snr_duration_product",
        ]
    );
    Ok(())
}

#[test]
fn test_deterministic_training() -> Result<()> {
    let dir = TempDir::new()?;
    let dataset = create_synthetic_dataset(20)?;

    let first = pipeline(&dir).train(&dataset, false)?;
    let second = pipeline(&dir).train(&dataset, false)?;

    assert_eq!(first.result, second.result, "results should be identical");
    assert_eq!(
        first.artifact.model, second.artifact.model,
        "ensembles should be identical"
    );
    assert_eq!(
        first.artifact.metadata.model_hash, second.artifact.metadata.model_hash,
        "model hashes should be identical"
    );
    assert_eq!(
        canonical_json_string(&first.artifact.model)?,
        canonical_json_string(&second.artifact.model)?
    );
    assert!(
        !dir.path().join("model.json").exists(),
        "persist=false must not write"
    );
    Ok(())
}

#[test]
fn test_too_few_rows_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let dataset = create_synthetic_dataset(MIN_TRAIN_ROWS - 1)?;

    let err = pipeline(&dir).train(&dataset, true).unwrap_err();
    assert!(matches!(err, TrainerError::InvalidInput(_)), "got {err}");
    assert!(!dir.path().join("model.json").exists());
    Ok(())
}

#[test]
fn test_persisted_artifact_predicts_like_trained_model() -> Result<()> {
    let dir = TempDir::new()?;
    let dataset = create_synthetic_dataset(12)?;

    let outcome = pipeline(&dir).train(&dataset, true)?;
    let loaded = ModelArtifact::load(&dir.path().join("model.json"))?;

    assert_eq!(loaded.metadata.model_hash, outcome.artifact.metadata.model_hash);
    assert_eq!(
        loaded.predict(&derive_features(&dataset)),
        outcome.artifact.predict(&derive_features(&dataset))
    );
    Ok(())
}

#[test]
fn test_tune_requires_ten_rows() -> Result<()> {
    let dir = TempDir::new()?;
    let dataset = create_synthetic_dataset(9)?;

    let err = pipeline(&dir)
        .tune(&dataset, &TuneRequest::default())
        .unwrap_err();
    assert!(matches!(err, TrainerError::InvalidInput(_)), "got {err}");
    Ok(())
}

#[test]
fn test_tune_persists_best_candidate() -> Result<()> {
    let dir = TempDir::new()?;
    let dataset = create_synthetic_dataset(12)?;

    let outcome = pipeline(&dir).tune(&dataset, &TuneRequest { cv: 3 })?;

    assert_eq!(outcome.result.n_folds, 3);
    assert_eq!(outcome.result.candidates, 8);
    assert!((0.0..=1.0).contains(&outcome.result.best_score));

    let loaded = ModelArtifact::load(&dir.path().join("model.json"))?;
    assert_eq!(loaded.params.num_trees, outcome.result.best_params.n_estimators);
    assert_eq!(loaded.params.max_depth, outcome.result.best_params.max_depth);
    assert_eq!(loaded.metadata.n_train, 12);
    assert_eq!(loaded.metadata.cv_score, Some(outcome.result.best_score));
    Ok(())
}

#[test]
fn test_activate_sees_persisted_artifact_only_on_success() -> Result<()> {
    let dir = TempDir::new()?;
    let pipeline = pipeline(&dir);

    let mut activated = None;
    pipeline.train_then(&create_synthetic_dataset(12)?, true, |artifact| {
        activated = Some(artifact.clone());
    })?;
    let on_disk = ModelArtifact::load(&dir.path().join("model.json"))?;
    assert_eq!(activated, Some(on_disk));

    let mut called = false;
    let result = pipeline.train_then(&create_synthetic_dataset(3)?, true, |_| called = true);
    assert!(result.is_err());
    assert!(!called, "a failed fit must not activate anything");
    Ok(())
}
