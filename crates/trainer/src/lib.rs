//! Exoplanet candidate classifier - deterministic GBDT training
//!
//! Binary log-loss gradient boosting over exact-greedy CART trees, the
//! seeded holdout / k-fold splitting used to score it, grid-search tuning
//! and the canonical-JSON model artifact shared with the server.

pub mod artifact;
pub mod cart;
pub mod deterministic;
pub mod errors;
pub mod matrix;
pub mod model;
pub mod pipeline;
pub mod serialization;
pub mod split;
pub mod trainer;
pub mod tuning;

pub use artifact::{ModelArtifact, ModelMetadata};
pub use deterministic::{LcgRng, SplitTieBreaker};
pub use errors::TrainerError;
pub use matrix::LabelledMatrix;
pub use model::{GbdtModel, Node, Tree};
pub use pipeline::{
    TrainingOutcome, TrainingPipeline, TrainingResult, TuningOutcome, MIN_TRAIN_ROWS,
    MIN_TUNE_ROWS,
};
pub use trainer::{GbdtConfig, GbdtTrainer};
pub use tuning::{ParamGrid, TuneRequest, TunedParams, TuningResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
