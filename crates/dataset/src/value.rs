//! Cell values of the candidate table.

use std::fmt;

use crate::errors::{PipelineError, Result};

/// Spellings accepted as a missing cell (compared case-insensitively).
const MISSING_MARKERS: [&str; 4] = ["", "na", "nan", "null"];

/// A single table cell: numeric, boolean or missing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    Number(f64),
    Bool(bool),
    #[default]
    Missing,
}

impl Value {
    /// Parse a raw CSV cell.
    pub fn parse_cell(cell: &str) -> Result<Self> {
        let trimmed = cell.trim();
        let lowered = trimmed.to_ascii_lowercase();

        if MISSING_MARKERS.contains(&lowered.as_str()) {
            return Ok(Value::Missing);
        }

        match lowered.as_str() {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            _ => {}
        }

        let number = trimmed
            .parse::<f64>()
            .map_err(|_| PipelineError::format(format!("unparseable value {trimmed:?}")))?;
        if !number.is_finite() {
            return Err(PipelineError::format(format!(
                "non-finite value {trimmed:?}"
            )));
        }
        Ok(Value::Number(number))
    }

    /// Convert a JSON scalar (as posted to the single-row endpoint).
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Null => Ok(Value::Missing),
            serde_json::Value::Bool(flag) => Ok(Value::Bool(*flag)),
            serde_json::Value::Number(number) => number
                .as_f64()
                .filter(|v| v.is_finite())
                .map(Value::Number)
                .ok_or_else(|| PipelineError::format(format!("unrepresentable number {number}"))),
            serde_json::Value::String(text) => Self::parse_cell(text),
            other => Err(PipelineError::format(format!(
                "expected a scalar value, got {other}"
            ))),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Strict numeric view: only `Number` cells qualify.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<Option<f64>> for Value {
    fn from(value: Option<f64>) -> Self {
        value.map(Value::Number).unwrap_or(Value::Missing)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{v}"),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Missing => Ok(()),
        }
    }
}
