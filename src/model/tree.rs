//! CART regression tree
//!
//! Splits minimise the weighted mean squared error of the children. Nodes are
//! stored in a flat arena, root first.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{MatchError, Result};

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    /// A node with fewer samples than this becomes a leaf
    pub min_samples_split: usize,
    /// Each child of a split must keep at least this many samples
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        TreeParams {
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
        samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    n_features: usize,
}

/// Best split found for a node
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    proxy: f64,
}

/// Mutable state while growing a tree
struct Builder<'a, R: Rng> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    params: TreeParams,
    n_features: usize,
    rng: &'a mut R,
    nodes: Vec<Node>,
    /// Weighted impurity decrease accumulated per feature
    importances: Vec<f64>,
}

impl RegressionTree {
    /// Grow a tree on the rows selected by `indices` (duplicates allowed)
    ///
    /// Returns the tree and its normalized impurity-based feature importances
    /// (all zero when the tree is a single leaf).
    pub fn fit<R: Rng>(
        x: &[Vec<f64>],
        y: &[f64],
        mut indices: Vec<usize>,
        params: TreeParams,
        rng: &mut R,
    ) -> (Self, Vec<f64>) {
        let n_features = x.first().map_or(0, |r| r.len());
        let mut builder = Builder {
            x,
            y,
            params,
            n_features,
            rng,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };

        if indices.is_empty() {
            builder.nodes.push(Node::Leaf {
                value: 0.0,
                samples: 0,
            });
        } else {
            builder.grow(&mut indices, 0);
        }

        let total: f64 = builder.importances.iter().sum();
        let importances = if total > 0.0 {
            builder.importances.iter().map(|v| v / total).collect()
        } else {
            vec![0.0; n_features]
        };

        (
            RegressionTree {
                nodes: builder.nodes,
                n_features,
            },
            importances,
        )
    }

    /// Predict a single (already scaled) row
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    idx = if v <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Check the node arena of a deserialized tree before it is queried
    ///
    /// Children must sit after their parent and inside the arena, which also
    /// rules out cycles, and split features must be in range.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(malformed("tree has no nodes".into()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match *node {
                Node::Leaf { value, .. } => {
                    if !value.is_finite() {
                        return Err(malformed(format!("leaf {} has non-finite value", idx)));
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= self.n_features {
                        return Err(MatchError::FeatureSchema(format!(
                            "node {} splits on feature {} of {}",
                            idx, feature, self.n_features
                        )));
                    }
                    if threshold.is_nan() {
                        return Err(malformed(format!("node {} has a NaN threshold", idx)));
                    }
                    for child in [left, right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(malformed(format!(
                                "node {} points at child {} (arena holds {})",
                                idx,
                                child,
                                self.nodes.len()
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Longest root-to-leaf path (a lone leaf has depth 0)
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

/// Structural damage in a persisted artifact
pub(crate) fn malformed(msg: String) -> MatchError {
    MatchError::Serialization(serde::de::Error::custom(msg))
}

impl<R: Rng> Builder<'_, R> {
    /// Grow the subtree for `indices` and return its node id
    fn grow(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let n = indices.len();
        let (mean, impurity) = self.stats(indices);

        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: mean,
            samples: n,
        });

        let p = self.params;
        if depth >= p.max_depth
            || n < p.min_samples_split
            || n < 2 * p.min_samples_leaf
            || impurity <= f64::EPSILON
        {
            return id;
        }

        let Some(split) = self.best_split(indices) else {
            return id;
        };

        // Partition in place: left side holds rows with value <= threshold
        let mut mid = 0;
        for i in 0..n {
            if self.x[indices[i]][split.feature] <= split.threshold {
                indices.swap(i, mid);
                mid += 1;
            }
        }
        let (left_idx, right_idx) = indices.split_at_mut(mid);

        let (_, left_imp) = self.stats(left_idx);
        let (_, right_imp) = self.stats(right_idx);
        self.importances[split.feature] += n as f64 * impurity
            - left_idx.len() as f64 * left_imp
            - right_idx.len() as f64 * right_imp;

        let left = self.grow(left_idx, depth + 1);
        let right = self.grow(right_idx, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    /// Mean and MSE impurity of the targets at `indices`
    fn stats(&self, indices: &[usize]) -> (f64, f64) {
        if indices.is_empty() {
            return (0.0, 0.0);
        }
        let n = indices.len() as f64;
        let mean = indices.iter().map(|&i| self.y[i]).sum::<f64>() / n;
        let impurity = indices
            .iter()
            .map(|&i| {
                let d = self.y[i] - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        (mean, impurity)
    }

    /// Exhaustive threshold search over every feature, in a random feature order
    fn best_split(&mut self, indices: &[usize]) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let total_sum: f64 = indices.iter().map(|&i| self.y[i]).sum();

        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(&mut *self.rng);

        let mut sorted = indices.to_vec();
        let mut best: Option<SplitCandidate> = None;

        for &f in &features {
            sorted.sort_by(|&a, &b| self.x[a][f].total_cmp(&self.x[b][f]));

            let mut left_sum = 0.0;
            for i in 1..n {
                left_sum += self.y[sorted[i - 1]];

                let lo = self.x[sorted[i - 1]][f];
                let hi = self.x[sorted[i]][f];
                if hi <= lo + 1e-7 {
                    continue;
                }
                if i < min_leaf || n - i < min_leaf {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                // Maximising this is equivalent to minimising child MSE
                let proxy = left_sum * left_sum / i as f64 + right_sum * right_sum / (n - i) as f64;

                if best.as_ref().map_or(true, |b| proxy > b.proxy) {
                    let mut threshold = (lo + hi) / 2.0;
                    if threshold >= hi || !threshold.is_finite() {
                        threshold = lo;
                    }
                    best = Some(SplitCandidate {
                        feature: f,
                        threshold,
                        proxy,
                    });
                }
            }
        }

        best
    }
}
