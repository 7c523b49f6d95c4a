//! HTTP service for the exoplanet candidate pipeline: dataset upload and
//! download, on-demand and scheduled retraining, tuning and prediction.

pub mod config;
pub mod context;
pub mod predictor;
pub mod scheduler;
pub mod server;

pub use config::ServiceConfig;
pub use context::ServiceContext;
pub use predictor::{PredictionResult, Predictor};
pub use scheduler::{run_scheduled_retrain, spawn_periodic_retrain};
pub use server::{build_router, start_server, AppState, ApiError};
