//! Exoplanet candidate dataset
//!
//! Typed table model, CSV codec, derived-feature computation and the
//! single-file dataset store used by the training service.

pub mod columns;
pub mod csv_codec;
pub mod dataset;
pub mod errors;
pub mod features;
pub mod record;
pub mod store;
pub mod value;

pub use columns::{ColumnKind, DerivedColumn, Operation, RawColumn, TARGET_COLUMN};
pub use csv_codec::{read_csv, read_csv_bytes, to_csv_bytes, write_csv};
pub use dataset::Dataset;
pub use errors::{PipelineError, Result};
pub use features::{derive_features, derive_in_place, feature_matrix, select_feature_columns};
pub use record::Record;
pub use store::{AppendOutcome, DatasetStore};
pub use value::Value;
