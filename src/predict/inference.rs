//! Model inference for match quality scores

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::{ArtifactStore, PersistedModel};
use crate::features::{MatchFeatures, RawMatchRecord};
use crate::model::ensemble::{mean_and_std, EnsembleRegressor};
use crate::{MatchError, Result};

/// Tree spread at which confidence bottoms out
pub const CONFIDENCE_SATURATION_STD: f64 = 0.5;

/// Score for one input record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted match quality in [0, 1]
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
}

impl PredictionResult {
    pub fn score_only(score: f64) -> Self {
        PredictionResult {
            score,
            confidence: None,
            std_dev: None,
        }
    }
}

/// Map tree disagreement to a 0-1 confidence
///
/// `1 - min(std, 0.5) / 0.5`. This is a heuristic spread measure, not a
/// calibrated probability.
pub fn confidence_from_std(std_dev: f64) -> f64 {
    let std_dev = if std_dev.is_finite() { std_dev.max(0.0) } else { CONFIDENCE_SATURATION_STD };
    1.0 - std_dev.min(CONFIDENCE_SATURATION_STD) / CONFIDENCE_SATURATION_STD
}

/// Predictor over a loaded, validated model bundle
#[derive(Debug)]
pub struct Predictor {
    model: PersistedModel,
    /// For each column of the bundle, its index in canonical feature order
    columns: Vec<usize>,
}

impl Predictor {
    /// Load a bundle from disk and validate it
    pub fn load(model_dir: impl AsRef<Path>) -> Result<Self> {
        let model = ArtifactStore::new(model_dir).load()?;
        Self::new(model)
    }

    /// Validate an in-memory bundle
    ///
    /// The bundle's feature names must be exactly the canonical set (any
    /// order); the scaler and forest must both be as wide as that list, and
    /// their internals must be well formed.
    pub fn new(model: PersistedModel) -> Result<Self> {
        let columns = resolve_columns(&model.feature_names)?;
        model.scaler.validate()?;
        model.forest.validate()?;

        if model.scaler.n_features() != columns.len() {
            return Err(MatchError::FeatureSchema(format!(
                "scaler was fitted on {} features, bundle lists {}",
                model.scaler.n_features(),
                columns.len()
            )));
        }
        if model.forest.n_features() != columns.len() {
            return Err(MatchError::FeatureSchema(format!(
                "forest was fitted on {} features, bundle lists {}",
                model.forest.n_features(),
                columns.len()
            )));
        }
        Ok(Predictor { model, columns })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.model.feature_names
    }

    pub fn model(&self) -> &PersistedModel {
        &self.model
    }

    /// Point scores clipped to [0, 1], one per record, in input order
    pub fn predict(&self, records: &[RawMatchRecord]) -> Result<Vec<f64>> {
        let rows = self.prepare(records)?;
        Ok(rows
            .iter()
            .map(|row| self.model.forest.predict(row).clamp(0.0, 1.0))
            .collect())
    }

    /// Scores with tree-spread confidence, one per record, in input order
    pub fn predict_with_confidence(&self, records: &[RawMatchRecord]) -> Result<Vec<PredictionResult>> {
        let rows = self.prepare(records)?;
        Ok(rows
            .iter()
            .map(|row| {
                let members = self.model.forest.predict_per_member(row);
                let (mean, std_dev) = mean_and_std(&members);
                PredictionResult {
                    score: mean.clamp(0.0, 1.0),
                    confidence: Some(confidence_from_std(std_dev)),
                    std_dev: Some(std_dev),
                }
            })
            .collect())
    }

    /// Score either way, depending on `include_confidence`
    pub fn score(&self, records: &[RawMatchRecord], include_confidence: bool) -> Result<Vec<PredictionResult>> {
        if include_confidence {
            self.predict_with_confidence(records)
        } else {
            Ok(self
                .predict(records)?
                .into_iter()
                .map(PredictionResult::score_only)
                .collect())
        }
    }

    /// Features in bundle column order, scaled
    fn prepare(&self, records: &[RawMatchRecord]) -> Result<Vec<Vec<f64>>> {
        if records.is_empty() {
            return Err(MatchError::InvalidInput("No prediction data provided".into()));
        }

        records
            .iter()
            .map(|record| {
                let canonical = MatchFeatures::from_record(record).to_vec();
                let ordered: Vec<f64> = self.columns.iter().map(|&i| canonical[i]).collect();
                self.model.scaler.transform(&ordered)
            })
            .collect()
    }
}

/// Map bundle feature names onto canonical positions
///
/// Fails unless the names are a permutation of the canonical set.
fn resolve_columns(names: &[String]) -> Result<Vec<usize>> {
    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(names.len());
    let mut unexpected = Vec::new();

    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(MatchError::FeatureSchema(format!("duplicate feature '{}'", name)));
        }
        match MatchFeatures::index_of(name) {
            Some(idx) => columns.push(idx),
            None => unexpected.push(name.as_str()),
        }
    }

    let missing: Vec<&str> = MatchFeatures::NAMES
        .iter()
        .copied()
        .filter(|n| !seen.contains(n))
        .collect();

    if !unexpected.is_empty() || !missing.is_empty() {
        return Err(MatchError::FeatureSchema(format!(
            "unexpected features [{}], missing features [{}]",
            unexpected.join(", "),
            missing.join(", ")
        )));
    }

    if columns.iter().enumerate().any(|(pos, &idx)| pos != idx) {
        log::debug!("Bundle feature order differs from canonical order, reindexing");
    }
    Ok(columns)
}
