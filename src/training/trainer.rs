//! Model fitting
//!
//! The protocol is fixed: canonical features, an 80/20 split with seed 42, a
//! scaler fit on the training partition only, and a 100-tree forest grown
//! with the same seed.

use crate::data::{ArtifactStore, MatchDataset, PersistedModel, TrainTestSplit, TrainingSample};
use crate::features::MatchFeatures;
use crate::model::{ForestConfig, RandomForest, StandardScaler};
use crate::training::metrics::{FeatureImportance, TrainMetrics};
use crate::{MatchError, Result, MIN_TRAINING_SAMPLES};

/// Seed shared by the split and the forest
pub const SEED: u64 = 42;

/// Fraction of samples held out for the test score
pub const TEST_FRACTION: f64 = 0.2;

/// Trainer for the match quality forest
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    forest: ForestConfig,
}

impl Default for ModelTrainer {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelTrainer {
    pub fn new() -> Self {
        ModelTrainer {
            forest: ForestConfig {
                seed: SEED,
                ..ForestConfig::default()
            },
        }
    }

    /// Hyperparameters used for every fit
    pub fn forest_config(&self) -> &ForestConfig {
        &self.forest
    }

    /// Fit scaler and forest, returning the bundle and its metrics
    pub fn fit(&self, samples: &[TrainingSample]) -> Result<(PersistedModel, TrainMetrics)> {
        if samples.len() < MIN_TRAINING_SAMPLES {
            return Err(MatchError::InsufficientData {
                found: samples.len(),
                required: MIN_TRAINING_SAMPLES,
            });
        }

        let dataset = MatchDataset::from_samples(samples);
        let split = TrainTestSplit::from_dataset(&dataset, TEST_FRACTION, SEED);

        let scaler = StandardScaler::fit(&split.train.features)?;
        let x_train = scaler.transform_rows(&split.train.features)?;
        let x_test = scaler.transform_rows(&split.test.features)?;

        log::info!(
            "Training forest: {} trees, max_depth={}, min_samples_split={}, min_samples_leaf={}",
            self.forest.n_trees,
            self.forest.tree.max_depth,
            self.forest.tree.min_samples_split,
            self.forest.tree.min_samples_leaf
        );
        let forest = RandomForest::fit(&x_train, &split.train.targets, &self.forest)?;

        let feature_names = MatchFeatures::names();
        let metrics = TrainMetrics {
            train_score: forest.score(&x_train, &split.train.targets),
            test_score: forest.score(&x_test, &split.test.targets),
            n_samples: samples.len(),
            feature_importance: FeatureImportance::new(
                &feature_names,
                forest.feature_importances(),
            ),
        };
        log::info!("{}", metrics);

        Ok((
            PersistedModel {
                forest,
                scaler,
                feature_names,
            },
            metrics,
        ))
    }

    /// Fit and publish the bundle; nothing is written if fitting fails
    pub fn train_and_save(
        &self,
        samples: &[TrainingSample],
        store: &ArtifactStore,
    ) -> Result<TrainMetrics> {
        let (model, metrics) = self.fit(samples)?;
        store.save(&model)?;
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::RawMatchRecord;

    /// Samples whose target rises with skill overlap
    fn synthetic_samples(n: usize) -> Vec<TrainingSample> {
        (0..n)
            .map(|i| {
                let overlap = (i % 6) as f64;
                let record = RawMatchRecord {
                    skill_overlap_count: overlap,
                    skill_overlap_ratio: overlap / 5.0,
                    gpa: 6.0 + (i % 5) as f64 * 0.8,
                    domain_match: i % 2 == 0,
                    location_match: i % 3 == 0,
                    duration: 8.0 + (i % 4) as f64 * 4.0,
                    stipend: 5000.0 + (i % 7) as f64 * 1000.0,
                    total_skills: 4.0 + (i % 3) as f64,
                    ..Default::default()
                };
                let target = (0.1 + overlap * 0.15 + if i % 2 == 0 { 0.05 } else { 0.0 }).min(1.0);
                TrainingSample::new(record, target)
            })
            .collect()
    }

    #[test]
    fn test_insufficient_data() {
        let err = ModelTrainer::new().fit(&synthetic_samples(9)).unwrap_err();
        assert!(matches!(
            err,
            MatchError::InsufficientData {
                found: 9,
                required: 10
            }
        ));
    }

    #[test]
    fn test_insufficient_data_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path().join("models"));
        let result = ModelTrainer::new().train_and_save(&synthetic_samples(5), &store);

        assert!(result.is_err());
        assert!(!store.model_dir().exists());
    }

    #[test]
    fn test_fit_metrics() {
        let (model, metrics) = ModelTrainer::new().fit(&synthetic_samples(80)).unwrap();

        assert_eq!(metrics.n_samples, 80);
        assert!(metrics.train_score.is_finite() && metrics.train_score > 0.8);
        assert!(metrics.test_score.is_finite() && metrics.test_score > 0.5);
        assert_eq!(metrics.feature_importance.len(), MatchFeatures::DIM);
        assert!((metrics.feature_importance.total() - 1.0).abs() < 1e-9);

        assert_eq!(model.feature_names, MatchFeatures::names());
        assert_eq!(model.scaler.n_features(), MatchFeatures::DIM);
        assert_eq!(model.forest.trees().len(), 100);
    }

    #[test]
    fn test_training_is_deterministic() {
        let samples = synthetic_samples(40);
        let trainer = ModelTrainer::new();
        let (model_a, metrics_a) = trainer.fit(&samples).unwrap();
        let (model_b, metrics_b) = trainer.fit(&samples).unwrap();

        assert_eq!(metrics_a, metrics_b);
        assert_eq!(model_a, model_b);
    }

    #[test]
    fn test_scaler_fit_on_training_partition_only() {
        let samples = synthetic_samples(50);
        let (model, _) = ModelTrainer::new().fit(&samples).unwrap();

        let dataset = MatchDataset::from_samples(&samples);
        let split = TrainTestSplit::from_dataset(&dataset, TEST_FRACTION, SEED);
        let expected = StandardScaler::fit(&split.train.features).unwrap();
        assert_eq!(model.scaler, expected);
    }

    #[test]
    fn test_fixed_hyperparameters() {
        let config = *ModelTrainer::new().forest_config();
        assert_eq!(config.n_trees, 100);
        assert_eq!(config.tree.max_depth, 10);
        assert_eq!(config.tree.min_samples_split, 5);
        assert_eq!(config.tree.min_samples_leaf, 2);
        assert_eq!(config.seed, 42);
    }
}
