//! Model training
//!
//! Fitting protocol and fit-quality metrics.

pub mod metrics;
pub mod trainer;

pub use metrics::{r2_score, FeatureImportance, TrainMetrics};
pub use trainer::ModelTrainer;
