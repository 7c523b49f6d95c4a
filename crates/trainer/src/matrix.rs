//! Labelled feature matrix extracted from a derived dataset.

use exo_dataset::{feature_matrix, select_feature_columns, Dataset, Value, TARGET_COLUMN};

use crate::errors::TrainerError;

/// Rows with a known binary label, projected onto the feature columns.
#[derive(Debug, Clone)]
pub struct LabelledMatrix {
    pub feature_columns: Vec<String>,
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
}

impl LabelledMatrix {
    /// Build the training matrix. Rows with a missing target are dropped;
    /// fewer than `min_rows` remaining rows is an error.
    pub fn from_dataset(dataset: &Dataset, min_rows: usize) -> Result<Self, TrainerError> {
        if !dataset.has_target() {
            return Err(TrainerError::invalid_input(format!(
                "dataset has no '{TARGET_COLUMN}' column"
            )));
        }

        let feature_columns = select_feature_columns(dataset);
        if feature_columns.is_empty() {
            return Err(TrainerError::invalid_input(
                "dataset has no known feature columns",
            ));
        }

        let mut labelled = Dataset::with_columns(dataset.columns().iter().map(String::as_str))
            .map_err(|err| TrainerError::invalid_input(err.to_string()))?;
        let mut labels = Vec::with_capacity(dataset.len());

        for record in dataset.records() {
            let label = match record.target() {
                Value::Missing => continue,
                Value::Bool(flag) => u8::from(flag),
                Value::Number(n) if n == 0.0 => 0,
                Value::Number(n) if n == 1.0 => 1,
                Value::Number(n) => {
                    return Err(TrainerError::invalid_input(format!(
                        "target value {n} is not binary (expected 0 or 1)"
                    )))
                }
            };
            labels.push(label);
            labelled.push(record.clone());
        }

        if labels.len() < min_rows {
            return Err(TrainerError::invalid_input(format!(
                "need at least {min_rows} labelled rows, found {}",
                labels.len()
            )));
        }

        Ok(Self {
            features: feature_matrix(&labelled, &feature_columns),
            feature_columns,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Rows at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> (Vec<Vec<f64>>, Vec<u8>) {
        indices
            .iter()
            .map(|&idx| (self.features[idx].clone(), self.labels[idx]))
            .unzip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exo_dataset::read_csv_bytes;

    #[test]
    fn drops_unlabelled_rows_and_imputes_zero() -> anyhow::Result<()> {
        let dataset = read_csv_bytes(
            b"planet_radius,stellar_radius,planet_radius_missing,target\n\
              2,,false,1\n3,1,false,\n4,2,true,false\n",
        )?;
        let matrix = LabelledMatrix::from_dataset(&dataset, 1)?;

        assert_eq!(matrix.feature_columns, vec!["planet_radius", "stellar_radius"]);
        assert_eq!(matrix.labels, vec![1, 0]);
        assert_eq!(matrix.features, vec![vec![2.0, 0.0], vec![4.0, 2.0]]);
        Ok(())
    }

    #[test]
    fn rejects_missing_target_and_non_binary_labels() -> anyhow::Result<()> {
        let no_target = read_csv_bytes(b"planet_radius\n1\n")?;
        assert!(LabelledMatrix::from_dataset(&no_target, 1).is_err());

        let non_binary = read_csv_bytes(b"planet_radius,target\n1,2\n")?;
        assert!(LabelledMatrix::from_dataset(&non_binary, 1).is_err());
        Ok(())
    }

    #[test]
    fn enforces_minimum_rows_after_dropping() -> anyhow::Result<()> {
        let dataset = read_csv_bytes(b"planet_radius,target\n1,1\n2,\n3,0\n")?;
        let err = LabelledMatrix::from_dataset(&dataset, 3).unwrap_err();
        assert!(err.to_string().contains("found 2"));
        Ok(())
    }

    #[test]
    fn rejects_schema_without_features() -> anyhow::Result<()> {
        let dataset = read_csv_bytes(b"kepid,target\n7,1\n")?;
        assert!(LabelledMatrix::from_dataset(&dataset, 1).is_err());
        Ok(())
    }
}
