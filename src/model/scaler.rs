//! Per-feature z-score scaling

use serde::{Deserialize, Serialize};

use super::tree::malformed;
use crate::{MatchError, Result};

/// Standardizes features by removing the mean and scaling to unit variance
///
/// Statistics are population (ddof = 0). Constant features keep a scale of
/// 1.0 so they map to zero instead of dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Compute statistics from training rows
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let first = rows
            .first()
            .ok_or_else(|| MatchError::InvalidInput("cannot fit scaler on zero rows".into()))?;
        let dim = first.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != dim) {
            return Err(MatchError::FeatureSchema(format!(
                "scaler rows have inconsistent width: expected {}, found {}",
                dim,
                bad.len()
            )));
        }

        let n = rows.len() as f64;
        let mut mean = vec![0.0; dim];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; dim];
        for row in rows {
            for j in 0..dim {
                let d = row[j] - mean[j];
                var[j] += d * d;
            }
        }

        let scale = var
            .into_iter()
            .map(|v| {
                let std = (v / n).sqrt();
                if std < 10.0 * f64::EPSILON {
                    1.0
                } else {
                    std
                }
            })
            .collect();

        Ok(StandardScaler { mean, scale })
    }

    /// Number of features the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Check deserialized statistics: one finite mean and one positive finite
    /// scale per feature
    pub fn validate(&self) -> Result<()> {
        if self.scale.len() != self.mean.len() {
            return Err(MatchError::FeatureSchema(format!(
                "scaler has {} means but {} scales",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if let Some(j) = self.mean.iter().position(|m| !m.is_finite()) {
            return Err(malformed(format!("scaler mean {} is not finite", j)));
        }
        if let Some(j) = self.scale.iter().position(|s| !s.is_finite() || *s <= 0.0) {
            return Err(malformed(format!("scaler scale {} is {}", j, self.scale[j])));
        }
        Ok(())
    }

    /// Scale a single row: (x - mean) / scale
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.n_features() {
            return Err(MatchError::FeatureSchema(format!(
                "scaler expects {} features, got {}",
                self.n_features(),
                row.len()
            )));
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }

    /// Scale every row
    pub fn transform_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}
