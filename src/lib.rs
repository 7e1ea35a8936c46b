//! Internship match quality scoring
//!
//! Turns student-internship match records into a fixed-order feature vector,
//! trains a random forest regressor on historical outcomes, and scores new
//! pairings with an optional tree-disagreement confidence.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum number of labeled samples required to fit a model
pub const MIN_TRAINING_SAMPLES: usize = 10;

/// Application-wide errors
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Need at least {required} training samples, got {found}")]
    InsufficientData { found: usize, required: usize },

    #[error("Model artifact not found: {0}")]
    ModelNotFound(String),

    #[error("Feature schema mismatch: {0}")]
    FeatureSchema(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MatchError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding the model, scaler and feature-name artifacts
    pub model_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Worker threads for tree fitting (0 = all cores)
    pub threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data: DataConfig {
                model_dir: "ml/models".to_string(),
            },
            training: TrainingConfig { threads: 0 },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MatchError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| MatchError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| MatchError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();

        let mut config = Config::default();
        config.data.model_dir = "custom/models".to_string();
        config.training.threads = 2;
        config.save(path).unwrap();

        let loaded = Config::load(path).unwrap();
        assert_eq!(loaded.data.model_dir, "custom/models");
        assert_eq!(loaded.training.threads, 2);
    }

    #[test]
    fn test_config_missing_file() {
        let err = Config::load("/nonexistent/config.toml").unwrap_err();
        assert!(matches!(err, MatchError::Config(_)));
    }

    #[test]
    fn test_insufficient_data_message() {
        let err = MatchError::InsufficientData {
            found: 3,
            required: MIN_TRAINING_SAMPLES,
        };
        assert_eq!(err.to_string(), "Need at least 10 training samples, got 3");
    }
}
