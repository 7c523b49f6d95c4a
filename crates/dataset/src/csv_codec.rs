//! CSV encoding of [`Dataset`].
//!
//! Comma-delimited, first line is the header, every row must have exactly as
//! many fields as the header. Cells are parsed with [`Value::parse_cell`].

use std::io::{Read, Write};

use crate::dataset::Dataset;
use crate::errors::{PipelineError, Result};
use crate::value::Value;

/// Parse a CSV stream. Empty input yields an empty dataset with no schema.
pub fn read_csv<R: Read>(reader: R) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|err| PipelineError::format(format!("failed to read CSV header: {err}")))?
        .clone();

    if headers.is_empty() {
        return Ok(Dataset::default());
    }

    let mut dataset = Dataset::with_columns(headers.iter())?;
    let columns = dataset.columns().to_vec();
    let mut rows = Vec::new();

    for (row_idx, record) in reader.records().enumerate() {
        let record = record
            .map_err(|err| PipelineError::format(format!("failed to read CSV row: {err}")))?;
        let mut cells = Vec::with_capacity(record.len());
        for (col_idx, field) in record.iter().enumerate() {
            let value = Value::parse_cell(field).map_err(|err| {
                PipelineError::format(format!(
                    "row {}, column {}: {err}",
                    row_idx + 1,
                    columns[col_idx]
                ))
            })?;
            cells.push(value);
        }
        rows.push(cells);
    }

    if !rows.is_empty() {
        dataset = Dataset::from_rows(columns, rows)?;
    }
    Ok(dataset)
}

pub fn read_csv_bytes(bytes: &[u8]) -> Result<Dataset> {
    read_csv(bytes)
}

/// Write the dataset as CSV. A dataset without a schema writes nothing.
pub fn write_csv<W: Write>(dataset: &Dataset, writer: W) -> Result<()> {
    if dataset.columns().is_empty() {
        return Ok(());
    }

    let mut writer = csv::Writer::from_writer(writer);
    writer
        .write_record(dataset.columns())
        .map_err(|err| PipelineError::storage(format!("failed to write CSV header: {err}")))?;

    for record in dataset.records() {
        let cells = dataset
            .columns()
            .iter()
            .map(|column| record.get(column).to_string());
        writer
            .write_record(cells)
            .map_err(|err| PipelineError::storage(format!("failed to write CSV row: {err}")))?;
    }

    writer
        .flush()
        .map_err(|err| PipelineError::storage(format!("failed to flush CSV: {err}")))?;
    Ok(())
}

pub fn to_csv_bytes(dataset: &Dataset) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_csv(dataset, &mut buffer)?;
    Ok(buffer)
}
