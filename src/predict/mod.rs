//! Prediction and inference
//!
//! Load trained model bundles and score match records.

pub mod inference;

pub use inference::{confidence_from_std, PredictionResult, Predictor};
