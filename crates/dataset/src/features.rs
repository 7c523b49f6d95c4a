//! Derived feature computation and feature-matrix projection.
//!
//! Derivation adds up to ten ratio/product columns. A derived cell is present
//! only when both operands are present and the result is finite; a zero
//! divisor leaves the cell absent instead of producing inf/NaN.

use crate::columns::{is_missing_flag, ColumnKind, DerivedColumn, RawColumn};
use crate::dataset::Dataset;
use crate::record::Record;

/// Return a copy of `dataset` with derived columns added.
pub fn derive_features(dataset: &Dataset) -> Dataset {
    let mut derived = dataset.clone();
    derive_in_place(&mut derived);
    derived
}

/// Add derived columns to the schema (only those whose operand columns are
/// both in the schema) and recompute them for every row.
pub fn derive_in_place(dataset: &mut Dataset) {
    let applicable: Vec<DerivedColumn> = DerivedColumn::ALL
        .iter()
        .copied()
        .filter(|column| {
            let (lhs, _, rhs) = column.formula();
            dataset.has_column(lhs.name()) && dataset.has_column(rhs.name())
        })
        .collect();

    for column in &applicable {
        dataset.ensure_column(column.name());
    }

    for record in dataset.records_mut() {
        derive_record(record);
    }

    tracing::debug!(
        rows = dataset.len(),
        derived = applicable.len(),
        "derived feature columns"
    );
}

/// Recompute every derived slot of a single row from its raw slots.
pub fn derive_record(record: &mut Record) {
    for column in DerivedColumn::ALL {
        let (lhs, op, rhs) = column.formula();
        let value = match (record.raw(lhs), record.raw(rhs)) {
            (Some(a), Some(b)) => op.apply(a, b),
            _ => None,
        };
        record.set_derived(column, value);
    }
}

/// Feature columns present in the schema, in canonical order: raw columns
/// first, then derived columns. Missingness flags and passthrough columns are
/// never included.
pub fn select_feature_columns(dataset: &Dataset) -> Vec<String> {
    let raw = RawColumn::ALL.iter().map(|c| c.name());
    let derived = DerivedColumn::ALL.iter().map(|c| c.name());

    raw.chain(derived)
        .filter(|name| dataset.has_column(name))
        .filter(|name| !is_missing_flag(name))
        .map(str::to_string)
        .collect()
}

/// Project every row onto `feature_columns`, in that order, imputing 0.0 for
/// missing cells.
pub fn feature_matrix(dataset: &Dataset, feature_columns: &[String]) -> Vec<Vec<f64>> {
    dataset
        .records()
        .iter()
        .map(|record| feature_row(record, feature_columns))
        .collect()
}

pub fn feature_row(record: &Record, feature_columns: &[String]) -> Vec<f64> {
    feature_columns
        .iter()
        .map(|column| {
            if ColumnKind::classify(column).is_feature() {
                record.get(column).as_number().unwrap_or(0.0)
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_codec::read_csv_bytes;
    use crate::value::Value;

    #[test]
    fn derives_only_columns_with_both_operands_in_schema() {
        let dataset = read_csv_bytes(b"planet_radius,stellar_radius,target\n2,1,1\n").unwrap();
        let derived = derive_features(&dataset);

        assert!(derived.has_column("radius_ratio"));
        assert!(!derived.has_column("temp_ratio"));
        assert_eq!(derived.records()[0].get("radius_ratio"), Value::Number(2.0));
        assert_eq!(dataset.columns().len(), 3, "input is not modified");
    }

    #[test]
    fn missing_operand_leaves_cell_absent() {
        let dataset =
            read_csv_bytes(b"planet_radius,stellar_radius,transit_depth\n2,,10\n,1,10\n").unwrap();
        let derived = derive_features(&dataset);

        let first = &derived.records()[0];
        assert_eq!(first.derived(DerivedColumn::RadiusRatio), None);
        assert_eq!(first.derived(DerivedColumn::RadiusDepthProduct), Some(20.0));
        let second = &derived.records()[1];
        assert_eq!(second.derived(DerivedColumn::RadiusRatio), None);
        assert_eq!(second.derived(DerivedColumn::RadiusDepthProduct), None);
    }

    #[test]
    fn zero_divisor_leaves_cell_absent() {
        let dataset = read_csv_bytes(b"planet_radius,stellar_radius\n2,0\n").unwrap();
        let derived = derive_features(&dataset);
        assert_eq!(derived.records()[0].get("radius_ratio"), Value::Missing);
    }

    #[test]
    fn rederiving_is_idempotent_and_clears_stale_values() {
        let dataset =
            read_csv_bytes(b"planet_radius,stellar_radius,radius_ratio\n2,4,99\n,4,7\n").unwrap();
        let once = derive_features(&dataset);
        let twice = derive_features(&once);

        assert_eq!(once, twice);
        assert_eq!(once.records()[0].get("radius_ratio"), Value::Number(0.5));
        assert_eq!(once.records()[1].get("radius_ratio"), Value::Missing);
    }

    #[test]
    fn feature_selection_is_canonical_and_skips_flags() {
        let dataset = read_csv_bytes(
            b"target,planet_radius_missing,stellar_radius,planet_radius,note\n1,false,1,2,3\n",
        )
        .unwrap();
        let derived = derive_features(&dataset);
        let features = select_feature_columns(&derived);

        assert_eq!(features, vec!["planet_radius", "stellar_radius", "radius_ratio"]);

        let matrix = feature_matrix(&derived, &features);
        assert_eq!(matrix, vec![vec![2.0, 1.0, 2.0]]);
    }

    #[test]
    fn projection_imputes_zero() {
        let dataset = read_csv_bytes(b"planet_radius,stellar_radius\n,3\n").unwrap();
        let columns = vec![
            "planet_radius".to_string(),
            "stellar_radius".to_string(),
            "orbital_period".to_string(),
        ];
        assert_eq!(feature_matrix(&dataset, &columns), vec![vec![0.0, 3.0, 0.0]]);
    }
}
