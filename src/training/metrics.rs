//! Fit-quality metrics

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Coefficient of determination
///
/// When the targets have no variance the score is 1.0 for a perfect fit and
/// 0.0 otherwise, so the result is always finite.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len().min(y_pred.len());
    if n == 0 {
        return 0.0;
    }

    let mean = y_true[..n].iter().sum::<f64>() / n as f64;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    let ss_tot: f64 = y_true[..n].iter().map(|t| (t - mean) * (t - mean)).sum();

    let tolerance = n as f64 * f64::EPSILON;
    if ss_tot <= tolerance {
        return if ss_res <= tolerance { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Feature importances keyed by name, kept in feature order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureImportance(Vec<(String, f64)>);

impl FeatureImportance {
    pub fn new(names: &[String], values: &[f64]) -> Self {
        FeatureImportance(
            names
                .iter()
                .cloned()
                .zip(values.iter().copied())
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.0.iter().map(|(_, v)| v).sum()
    }

    /// Features sorted by importance, highest first
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

impl Serialize for FeatureImportance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Result of a training run
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TrainMetrics {
    /// R² on the training partition
    pub train_score: f64,
    /// R² on the held-out partition
    pub test_score: f64,
    /// Total samples supplied (both partitions)
    pub n_samples: usize,
    pub feature_importance: FeatureImportance,
}

impl fmt::Display for TrainMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Samples: {} | Train R²: {:.4} | Test R²: {:.4}",
            self.n_samples, self.train_score, self.test_score
        )?;
        if let Some((name, value)) = self.feature_importance.ranked().first() {
            write!(f, " | Top feature: {} ({:.3})", name, value)?;
        }
        Ok(())
    }
}
