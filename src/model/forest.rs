//! Random forest regressor
//!
//! Bagged CART trees, each grown on a bootstrap sample with every feature
//! considered at each split. Trees are fitted in parallel; every tree gets its
//! own seed drawn up front so the result does not depend on scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::ensemble::EnsembleRegressor;
use super::tree::{malformed, RegressionTree, TreeParams};
use crate::{MatchError, Result};

/// Forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub tree: TreeParams,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        ForestConfig {
            n_trees: 100,
            tree: TreeParams::default(),
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
    /// Mean decrease in impurity, sums to 1
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Fit the forest on scaled rows
    pub fn fit(x: &[Vec<f64>], y: &[f64], config: &ForestConfig) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(MatchError::InvalidInput(format!(
                "forest needs matching non-empty rows and targets (rows={}, targets={})",
                x.len(),
                y.len()
            )));
        }
        if config.n_trees == 0 {
            return Err(MatchError::InvalidInput("forest needs at least one tree".into()));
        }

        let n = x.len();
        let n_features = x[0].len();

        let mut master = StdRng::seed_from_u64(config.seed);
        let seeds: Vec<u64> = (0..config.n_trees).map(|_| master.gen()).collect();

        log::debug!(
            "Fitting {} trees on {} rows x {} features",
            config.n_trees,
            n,
            n_features
        );

        let fitted: Vec<(RegressionTree, Vec<f64>)> = seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(x, y, bootstrap, config.tree, &mut rng)
            })
            .collect();

        // Only trees that split contribute to importances
        let mut importances = vec![0.0; n_features];
        let mut contributing = 0usize;
        for (tree, tree_imp) in &fitted {
            if tree.node_count() > 1 {
                contributing += 1;
                for (acc, v) in importances.iter_mut().zip(tree_imp) {
                    *acc += v;
                }
            }
        }
        let total: f64 = importances.iter().sum();
        let feature_importances = if contributing > 0 && total > 0.0 {
            importances.iter().map(|v| v / total).collect()
        } else {
            // No tree ever split: nothing distinguishes the features
            vec![1.0 / n_features.max(1) as f64; n_features]
        };

        Ok(RandomForest {
            trees: fitted.into_iter().map(|(t, _)| t).collect(),
            n_features,
            feature_importances,
        })
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Check a deserialized forest: at least one tree, every tree well formed
    /// and as wide as the forest
    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(MatchError::ModelNotFound("model bundle contains no trees".into()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            if tree.n_features() != self.n_features {
                return Err(MatchError::FeatureSchema(format!(
                    "tree {} was fitted on {} features, forest on {}",
                    i,
                    tree.n_features(),
                    self.n_features
                )));
            }
            tree.validate()
                .map_err(|e| match e {
                    MatchError::Serialization(inner) => malformed(format!("tree {}: {}", i, inner)),
                    other => other,
                })?;
        }
        Ok(())
    }

    /// Coefficient of determination over a set of rows
    pub fn score(&self, x: &[Vec<f64>], y: &[f64]) -> f64 {
        let predictions: Vec<f64> = x.iter().map(|row| self.predict(row)).collect();
        crate::training::metrics::r2_score(y, &predictions)
    }
}

impl EnsembleRegressor for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_members(&self) -> usize {
        self.trees.len()
    }

    fn predict_per_member(&self, row: &[f64]) -> Vec<f64> {
        self.trees.iter().map(|t| t.predict(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy_linear(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..n)
            .map(|i| vec![i as f64 / n as f64, ((i * 7) % 5) as f64])
            .collect();
        let y: Vec<f64> = x
            .iter()
            .map(|r| 0.8 * r[0] + 0.02 * r[1])
            .collect();
        (x, y)
    }

    #[test]
    fn test_fit_and_predict() {
        let (x, y) = noisy_linear(60);
        let forest = RandomForest::fit(&x, &y, &ForestConfig::default()).unwrap();

        assert_eq!(forest.n_members(), 100);
        assert_eq!(forest.n_features(), 2);
        assert!(forest.score(&x, &y) > 0.8);
        assert!(forest.feature_importances()[0] > forest.feature_importances()[1]);
    }

    #[test]
    fn test_deterministic() {
        let (x, y) = noisy_linear(40);
        let config = ForestConfig {
            n_trees: 20,
            ..Default::default()
        };
        let a = RandomForest::fit(&x, &y, &config).unwrap();
        let b = RandomForest::fit(&x, &y, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y) = noisy_linear(30);
        let forest = RandomForest::fit(&x, &y, &ForestConfig::default()).unwrap();
        let total: f64 = forest.feature_importances().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);

        let constant = RandomForest::fit(&x, &vec![0.4; 30], &ForestConfig::default()).unwrap();
        let total: f64 = constant.feature_importances().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_per_member_mean_matches_predict() {
        let (x, y) = noisy_linear(25);
        let forest = RandomForest::fit(&x, &y, &ForestConfig::default()).unwrap();
        let members = forest.predict_per_member(&x[3]);
        let mean = members.iter().sum::<f64>() / members.len() as f64;
        assert!((mean - forest.predict(&x[3])).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_mismatched_input() {
        let err = RandomForest::fit(&[vec![1.0]], &[], &ForestConfig::default()).unwrap_err();
        assert!(matches!(err, MatchError::InvalidInput(_)));
    }
}
