//! Synchronous service operations shared by the HTTP handlers and the
//! retrain scheduler.
//!
//! Two locks guard the on-disk state: the data lock (inside
//! [`DatasetStore`]) and the model lock (inside [`TrainingPipeline`]). No
//! operation holds both; a retrain reads the dataset, releases the data lock
//! and only then fits under the model lock.

use std::sync::Arc;

use exo_dataset::{
    derive_features, read_csv_bytes, to_csv_bytes, AppendOutcome, Dataset, DatasetStore,
    PipelineError, Record, Result, Value,
};
use exo_trainer::{TrainingPipeline, TrainingResult, TuneRequest, TuningResult};
use parking_lot::Mutex;
use tracing::info;

use crate::config::ServiceConfig;
use crate::predictor::{PredictionResult, Predictor};

pub struct ServiceContext {
    store: DatasetStore,
    pipeline: TrainingPipeline,
    predictor: Predictor,
}

impl ServiceContext {
    /// Create the data directory and empty dataset file if needed and load
    /// any persisted model.
    pub fn open(config: &ServiceConfig) -> Result<Self> {
        let data_lock = Arc::new(Mutex::new(()));
        let model_lock = Arc::new(Mutex::new(()));

        let store = DatasetStore::with_lock(config.dataset_path(), data_lock);
        store.initialize()?;

        let pipeline =
            TrainingPipeline::with_lock(config.model_path(), model_lock, config.training.clone());

        let predictor = Predictor::new();
        predictor.load_from_disk(pipeline.model_path());

        Ok(Self {
            store,
            pipeline,
            predictor,
        })
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn model_loaded(&self) -> bool {
        self.predictor.is_loaded()
    }

    /// Parse an uploaded CSV, derive features and append it.
    pub fn upload_csv(&self, bytes: &[u8]) -> Result<AppendOutcome> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(PipelineError::format("uploaded file is empty"));
        }
        let rows = read_csv_bytes(bytes)?;
        if rows.columns().is_empty() {
            return Err(PipelineError::format("uploaded file has no header"));
        }
        if rows.is_empty() {
            return Err(PipelineError::format("uploaded file has no data rows"));
        }
        self.append_derived(rows)
    }

    /// Append a single row given as a JSON object of column to value.
    pub fn upload_row(&self, row: &serde_json::Value) -> Result<AppendOutcome> {
        let object = row
            .as_object()
            .ok_or_else(|| PipelineError::format("row must be a JSON object"))?;
        if object.is_empty() {
            return Err(PipelineError::format("row has no columns"));
        }

        let mut rows = Dataset::with_columns(object.keys().map(String::as_str))?;
        let mut record = Record::new();
        for (column, value) in object {
            record.set(column.trim(), Value::from_json(value)?)?;
        }
        rows.push(record);

        self.append_derived(rows)
    }

    fn append_derived(&self, rows: Dataset) -> Result<AppendOutcome> {
        let outcome = self.store.append(derive_features(&rows))?;
        info!(
            rows_added = outcome.rows_added,
            total_rows = outcome.total_rows,
            columns = outcome.total_columns,
            "appended rows"
        );
        Ok(outcome)
    }

    /// The stored table as CSV, or `None` when nothing has been stored.
    pub fn download(&self) -> Result<Option<Vec<u8>>> {
        if self.store.is_empty()? {
            return Ok(None);
        }
        to_csv_bytes(&self.store.read_all()?).map(Some)
    }

    /// Fit on the stored table, persist and activate the new model.
    pub fn retrain(&self) -> Result<TrainingResult> {
        let dataset = self.store.read_all()?;
        let outcome = self.pipeline.train_then(&dataset, true, |artifact| {
            self.predictor.install(artifact.clone());
        })?;
        Ok(outcome.result)
    }

    /// Grid-search over the stored table, persist and activate the best model.
    pub fn tune(&self, request: &TuneRequest) -> Result<TuningResult> {
        let dataset = self.store.read_all()?;
        let outcome = self.pipeline.tune_then(&dataset, request, |artifact| {
            self.predictor.install(artifact.clone());
        })?;
        Ok(outcome.result)
    }

    /// Score every stored row with the active model.
    pub fn predict(&self) -> Result<PredictionResult> {
        if !self.predictor.is_loaded() {
            return Err(PipelineError::ModelUnavailable);
        }
        let dataset = self.store.read_all()?;
        self.predictor.predict_dataset(&dataset)
    }
}
