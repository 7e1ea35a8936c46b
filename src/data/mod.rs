//! Training data and model storage
//!
//! Labeled samples, the train/test split, and the on-disk model bundle.

pub mod artifacts;
pub mod dataset;

pub use artifacts::{ArtifactStore, PersistedModel};
pub use dataset::{MatchDataset, TrainTestSplit, TrainingSample};
