//! Regression models
//!
//! - Scaler: per-feature z-score normalization
//! - Tree: CART regression tree
//! - Forest: bagged ensemble of trees

pub mod ensemble;
pub mod forest;
pub mod scaler;
pub mod tree;

pub use ensemble::EnsembleRegressor;
pub use forest::{ForestConfig, RandomForest};
pub use scaler::StandardScaler;
pub use tree::{RegressionTree, TreeParams};
