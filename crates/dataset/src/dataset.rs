//! In-memory candidate table: an ordered schema plus ordered rows.

use std::collections::HashSet;

use crate::columns::{ColumnKind, TARGET_COLUMN};
use crate::errors::{PipelineError, Result};
use crate::record::Record;
use crate::value::Value;

/// Ordered table of records. Cells for columns a record never set read as
/// missing, which is how appends fill columns absent from an incoming batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl Dataset {
    /// Create an empty table with the given schema.
    pub fn with_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut dataset = Self::default();
        let mut seen = HashSet::new();
        for column in columns {
            let column = column.into();
            let trimmed = column.trim();
            if trimmed.is_empty() {
                return Err(PipelineError::format("empty column name in header"));
            }
            if !seen.insert(trimmed.to_string()) {
                return Err(PipelineError::format(format!(
                    "duplicate column {trimmed:?} in header"
                )));
            }
            dataset.columns.push(trimmed.to_string());
        }
        Ok(dataset)
    }

    /// Build a table from a header and row-major cells.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut dataset = Self::with_columns(columns)?;
        for (row_idx, cells) in rows.into_iter().enumerate() {
            if cells.len() != dataset.columns.len() {
                return Err(PipelineError::format(format!(
                    "row {}: expected {} values, got {}",
                    row_idx + 1,
                    dataset.columns.len(),
                    cells.len()
                )));
            }
            let mut record = Record::new();
            for (column, value) in dataset.columns.iter().zip(cells) {
                record
                    .set(column, value)
                    .map_err(|err| PipelineError::format(format!("row {}: {err}", row_idx + 1)))?;
            }
            dataset.records.push(record);
        }
        Ok(dataset)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn has_target(&self) -> bool {
        self.has_column(TARGET_COLUMN)
    }

    /// Add a column to the schema if absent. Returns true when it was added.
    pub fn ensure_column(&mut self, column: &str) -> bool {
        if self.has_column(column) {
            return false;
        }
        self.columns.push(column.to_string());
        true
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Append another table, reconciling schemas: incoming columns unknown to
    /// this table are added at the end of the schema, and columns the incoming
    /// rows lack stay missing for them. Returns the number of rows appended.
    pub fn append(&mut self, incoming: Dataset) -> usize {
        for column in &incoming.columns {
            self.ensure_column(column);
        }
        let added = incoming.records.len();
        self.records.extend(incoming.records);
        added
    }
}
