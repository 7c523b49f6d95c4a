//! Typed row representation.
//!
//! Known raw and derived measurements live in fixed numeric slots; the label
//! keeps its original value; anything else is carried through untouched in an
//! ordered side map.

use std::collections::BTreeMap;

use crate::columns::{ColumnKind, DerivedColumn, RawColumn};
use crate::errors::{PipelineError, Result};
use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    raw: [Option<f64>; RawColumn::COUNT],
    derived: [Option<f64>; DerivedColumn::COUNT],
    target: Value,
    passthrough: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cell by column name. Raw and derived columns only accept numbers.
    pub fn set(&mut self, column: &str, value: Value) -> Result<()> {
        match ColumnKind::classify(column) {
            ColumnKind::Raw(raw) => {
                self.raw[raw.index()] = numeric_slot(column, value)?;
            }
            ColumnKind::Derived(derived) => {
                self.derived[derived.index()] = numeric_slot(column, value)?;
            }
            ColumnKind::Target => self.target = value,
            ColumnKind::Passthrough => {
                if value.is_missing() {
                    self.passthrough.remove(column);
                } else {
                    self.passthrough.insert(column.to_string(), value);
                }
            }
        }
        Ok(())
    }

    /// Read a cell by column name; unknown or unset cells are `Missing`.
    pub fn get(&self, column: &str) -> Value {
        match ColumnKind::classify(column) {
            ColumnKind::Raw(raw) => self.raw[raw.index()].into(),
            ColumnKind::Derived(derived) => self.derived[derived.index()].into(),
            ColumnKind::Target => self.target,
            ColumnKind::Passthrough => self
                .passthrough
                .get(column)
                .copied()
                .unwrap_or(Value::Missing),
        }
    }

    pub fn raw(&self, column: RawColumn) -> Option<f64> {
        self.raw[column.index()]
    }

    pub fn derived(&self, column: DerivedColumn) -> Option<f64> {
        self.derived[column.index()]
    }

    pub fn set_derived(&mut self, column: DerivedColumn, value: Option<f64>) {
        self.derived[column.index()] = value;
    }

    pub fn target(&self) -> Value {
        self.target
    }
}

fn numeric_slot(column: &str, value: Value) -> Result<Option<f64>> {
    match value {
        Value::Number(v) => Ok(Some(v)),
        Value::Missing => Ok(None),
        Value::Bool(_) => Err(PipelineError::format(format!(
            "column {column} expects a numeric value, got a boolean"
        ))),
    }
}
