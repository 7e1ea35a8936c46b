//! Labeled training samples and the reproducible train/test split

use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::features::{normalize_rating, MatchFeatures, RawMatchRecord};

/// Target used when a sample carries no outcome at all
pub const DEFAULT_TARGET: f64 = 0.5;

/// A raw match record with its observed outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    #[serde(flatten)]
    pub record: RawMatchRecord,
    #[serde(
        rename = "targetScore",
        default,
        deserialize_with = "lenient_target",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_score: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_target",
        skip_serializing_if = "Option::is_none"
    )]
    pub rating: Option<f64>,
    /// 1-5 star review of the placement
    #[serde(
        rename = "overallScore",
        default,
        deserialize_with = "lenient_target",
        skip_serializing_if = "Option::is_none"
    )]
    pub overall_score: Option<f64>,
}

impl TrainingSample {
    pub fn new(record: RawMatchRecord, target_score: f64) -> Self {
        TrainingSample {
            record,
            target_score: Some(target_score),
            rating: None,
            overall_score: None,
        }
    }

    /// `targetScore`, else `rating`, else the star review mapped to [0, 1],
    /// else 0.5
    pub fn target(&self) -> f64 {
        self.target_score
            .or(self.rating)
            .or(self.overall_score.map(normalize_rating))
            .unwrap_or(DEFAULT_TARGET)
    }
}

/// Numeric target or nothing; non-numeric values count as absent
fn lenient_target<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

/// Feature matrix and target vector in canonical feature order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchDataset {
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl MatchDataset {
    /// Run every sample through the feature engineer
    pub fn from_samples(samples: &[TrainingSample]) -> Self {
        let mut dataset = MatchDataset::default();
        for sample in samples {
            dataset
                .features
                .push(MatchFeatures::from_record(&sample.record).to_vec());
            dataset.targets.push(sample.target());
        }
        dataset
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn select(&self, indices: &[usize]) -> Self {
        MatchDataset {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }
}

/// Train/test partition of a dataset
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: MatchDataset,
    pub test: MatchDataset,
}

impl TrainTestSplit {
    /// Shuffle row indices with `seed`, take the first `ceil(n * test_fraction)`
    /// as the test set and the rest as the training set
    pub fn from_dataset(full: &MatchDataset, test_fraction: f64, seed: u64) -> Self {
        let n = full.len();
        let n_test = ((n as f64 * test_fraction).ceil() as usize).min(n);

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let (test_idx, train_idx) = indices.split_at(n_test);

        log::info!(
            "Split {} samples: train={}, test={}",
            n,
            train_idx.len(),
            test_idx.len()
        );

        TrainTestSplit {
            train: full.select(train_idx),
            test: full.select(test_idx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(i: usize) -> TrainingSample {
        TrainingSample::new(
            RawMatchRecord {
                skill_overlap_count: i as f64,
                ..Default::default()
            },
            i as f64 / 100.0,
        )
    }

    #[test]
    fn test_target_fallbacks() {
        let with_target: TrainingSample =
            serde_json::from_value(json!({"gpa": 8.0, "targetScore": 0.9, "rating": 0.1})).unwrap();
        assert_eq!(with_target.target(), 0.9);
        assert_eq!(with_target.record.gpa, 8.0);

        let with_rating: TrainingSample =
            serde_json::from_value(json!({"rating": 0.3, "targetScore": null})).unwrap();
        assert_eq!(with_rating.target(), 0.3);

        let reviewed: TrainingSample = serde_json::from_value(json!({"overallScore": 4})).unwrap();
        assert_eq!(reviewed.target(), 0.75);

        let reviewed_with_rating: TrainingSample =
            serde_json::from_value(json!({"overallScore": 5, "rating": 0.2})).unwrap();
        assert_eq!(reviewed_with_rating.target(), 0.2);

        let bare: TrainingSample = serde_json::from_value(json!({"stipend": 5000})).unwrap();
        assert_eq!(bare.target(), DEFAULT_TARGET);
        assert_eq!(bare.record.stipend, 5000.0);
    }

    #[test]
    fn test_dataset_from_samples() {
        let samples: Vec<_> = (0..5).map(sample).collect();
        let dataset = MatchDataset::from_samples(&samples);

        assert_eq!(dataset.len(), 5);
        assert_eq!(dataset.features[3].len(), MatchFeatures::DIM);
        assert_eq!(dataset.features[3][0], 3.0);
        assert_eq!(dataset.targets[3], 0.03);
    }

    #[test]
    fn test_split_sizes() {
        let samples: Vec<_> = (0..12).map(sample).collect();
        let dataset = MatchDataset::from_samples(&samples);
        let split = TrainTestSplit::from_dataset(&dataset, 0.2, 42);

        // ceil(12 * 0.2) = 3
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 9);
    }

    #[test]
    fn test_split_reproducible_and_disjoint() {
        let samples: Vec<_> = (0..30).map(sample).collect();
        let dataset = MatchDataset::from_samples(&samples);

        let a = TrainTestSplit::from_dataset(&dataset, 0.2, 42);
        let b = TrainTestSplit::from_dataset(&dataset, 0.2, 42);
        assert_eq!(a.train, b.train);
        assert_eq!(a.test, b.test);

        let mut ids: Vec<f64> = a
            .train
            .features
            .iter()
            .chain(&a.test.features)
            .map(|f| f[0])
            .collect();
        ids.sort_by(|x, y| x.total_cmp(y));
        let expected: Vec<f64> = (0..30).map(|i| i as f64).collect();
        assert_eq!(ids, expected);
    }
}
