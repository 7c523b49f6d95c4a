//! Integration tests for the file-backed dataset store.
//! Covers append/reconcile semantics, whole-file rewrites and CSV round trips.

use std::sync::Arc;
use std::thread;

use anyhow::Result;
use exo_dataset::{
    derive_features, read_csv_bytes, to_csv_bytes, Dataset, DatasetStore, PipelineError, Value,
};
use tempfile::TempDir;

fn initialized_store(dir: &TempDir) -> Result<DatasetStore> {
    let store = DatasetStore::new(dir.path().join("data").join("main.csv"));
    store.initialize()?;
    Ok(store)
}

#[test]
fn first_append_establishes_schema() -> Result<()> {
    let dir = TempDir::new()?;
    let store = initialized_store(&dir)?;

    let rows = read_csv_bytes(b"planet_radius,stellar_radius,target\n2,1,1\n3,1,0\n")?;
    let outcome = store.append(rows)?;

    assert_eq!(outcome.rows_added, 2);
    assert_eq!(outcome.total_rows, 2);
    assert_eq!(outcome.total_columns, 3);

    let stored = store.read_all()?;
    assert_eq!(stored.columns(), &["planet_radius", "stellar_radius", "target"]);
    Ok(())
}

#[test]
fn download_after_upload_returns_prior_content_plus_upload() -> Result<()> {
    let dir = TempDir::new()?;
    let store = initialized_store(&dir)?;

    let first = b"planet_radius,target\n1,0\n2,1\n";
    store.append(read_csv_bytes(first)?)?;
    let before = store.read_all()?;

    let second = b"planet_radius,target\n3,1\n";
    store.append(read_csv_bytes(second)?)?;
    let after = store.read_all()?;

    assert_eq!(after.len(), before.len() + 1);
    assert_eq!(&after.records()[..before.len()], before.records());
    assert_eq!(after.records()[2].get("planet_radius"), Value::Number(3.0));

    let csv = String::from_utf8(to_csv_bytes(&after)?)?;
    assert_eq!(csv, "planet_radius,target\n1,0\n2,1\n3,1\n");
    Ok(())
}

#[test]
fn appends_reconcile_columns_in_both_directions() -> Result<()> {
    let dir = TempDir::new()?;
    let store = initialized_store(&dir)?;

    store.append(read_csv_bytes(b"planet_radius,target\n1,0\n")?)?;
    let outcome = store.append(read_csv_bytes(b"target,stellar_radius\n1,5\n")?)?;

    assert_eq!(outcome.total_columns, 3);
    let csv = String::from_utf8(to_csv_bytes(&store.read_all()?)?)?;
    assert_eq!(csv, "planet_radius,target,stellar_radius\n1,0,\n,1,5\n");
    Ok(())
}

#[test]
fn row_count_never_decreases() -> Result<()> {
    let dir = TempDir::new()?;
    let store = initialized_store(&dir)?;

    let mut previous = 0;
    for batch in [&b"a\n1\n"[..], b"a\n", b"b\n2\n3\n", b"a,b\n4,5\n"] {
        let outcome = store.append(read_csv_bytes(batch)?)?;
        assert!(outcome.total_rows >= previous);
        previous = outcome.total_rows;
    }
    assert_eq!(previous, 4);
    Ok(())
}

#[test]
fn derived_columns_survive_persistence() -> Result<()> {
    let dir = TempDir::new()?;
    let store = initialized_store(&dir)?;

    let rows = derive_features(&read_csv_bytes(
        b"planet_radius,stellar_radius,target\n2,1,1\n2,0,0\n",
    )?);
    store.append(rows)?;

    let stored = store.read_all()?;
    assert!(stored.has_column("radius_ratio"));
    assert_eq!(stored.records()[0].get("radius_ratio"), Value::Number(2.0));
    assert_eq!(stored.records()[1].get("radius_ratio"), Value::Missing);
    Ok(())
}

#[test]
fn replace_all_overwrites() -> Result<()> {
    let dir = TempDir::new()?;
    let store = initialized_store(&dir)?;

    store.append(read_csv_bytes(b"a\n1\n2\n")?)?;
    store.replace_all(&Dataset::with_columns(["x", "target"])?)?;

    let stored = store.read_all()?;
    assert_eq!(stored.columns(), &["x", "target"]);
    assert!(stored.is_empty());
    assert!(store.is_empty()?);
    Ok(())
}

#[test]
fn corrupt_store_reports_storage_error() -> Result<()> {
    let dir = TempDir::new()?;
    let store = initialized_store(&dir)?;
    std::fs::write(store.path(), "a,b\n1\n")?;

    assert!(matches!(store.read_all(), Err(PipelineError::Storage(_))));
    Ok(())
}

#[test]
fn concurrent_appends_are_serialized() -> Result<()> {
    let dir = TempDir::new()?;
    let store = Arc::new(initialized_store(&dir)?);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || -> Result<(), PipelineError> {
                let csv = format!("planet_radius,target\n{i},1\n");
                store.append(read_csv_bytes(csv.as_bytes())?)?;
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("append thread panicked")?;
    }

    assert_eq!(store.read_all()?.len(), 8);
    Ok(())
}
