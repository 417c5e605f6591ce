//! Isolation Forest anomaly scoring
//!
//! Anomalies are easier to isolate: random axis-aligned splits separate
//! them from the bulk of the data in fewer steps, so their average path
//! length across the forest is shorter.

use crate::error::{Error, Result};
use crate::models::percentile;
use ndarray::{ArrayView1, ArrayView2};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Euler–Mascheroni constant, used by the harmonic number approximation
const EULER_GAMMA: f64 = 0.5772156649;

/// A node in an isolation tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum IsolationNode {
    Internal {
        feature: usize,
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    Leaf {
        size: usize,
    },
}

/// Single isolation tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    root: IsolationNode,
}

impl IsolationTree {
    fn build(data: &ArrayView2<f64>, rows: &mut [usize], max_depth: usize, rng: &mut StdRng) -> Self {
        Self {
            root: Self::build_node(data, rows, 0, max_depth, rng),
        }
    }

    fn build_node(
        data: &ArrayView2<f64>,
        rows: &mut [usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> IsolationNode {
        if depth >= max_depth || rows.len() <= 1 {
            return IsolationNode::Leaf { size: rows.len() };
        }

        // Only features that still vary within this node can split it
        let ranges: Vec<(usize, f64, f64)> = (0..data.ncols())
            .filter_map(|feature| {
                let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                    let v = data[[r, feature]];
                    (lo.min(v), hi.max(v))
                });
                (max > min).then_some((feature, min, max))
            })
            .collect();

        let Some(&(feature, min, max)) = ranges.choose(rng) else {
            return IsolationNode::Leaf { size: rows.len() };
        };
        let threshold = rng.gen_range(min..max);

        // Partition in place: rows below the threshold go left
        let mut split = 0;
        for i in 0..rows.len() {
            if data[[rows[i], feature]] < threshold {
                rows.swap(i, split);
                split += 1;
            }
        }
        let (left_rows, right_rows) = rows.split_at_mut(split);

        let left = Self::build_node(data, left_rows, depth + 1, max_depth, rng);
        let right = Self::build_node(data, right_rows, depth + 1, max_depth, rng);

        IsolationNode::Internal {
            feature,
            threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn path_length(&self, sample: &ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        let mut depth = 0usize;
        loop {
            match node {
                IsolationNode::Leaf { size } => return depth as f64 + average_path_length(*size),
                IsolationNode::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] < *threshold {
                        left.as_ref()
                    } else {
                        right.as_ref()
                    };
                    depth += 1;
                }
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Fitted isolation forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    /// Expected anomaly rate used to place the decision offset
    pub contamination: f64,
    /// Rows drawn for each tree
    sample_size: usize,
    n_features: usize,
    trees: Vec<IsolationTree>,
    /// Raw-score percentile separating inliers from outliers
    offset: f64,
}

impl IsolationForest {
    /// Grow `n_estimators` trees on `data` and calibrate the outlier offset.
    pub fn fit(
        data: &ArrayView2<f64>,
        n_estimators: usize,
        max_samples: usize,
        contamination: f64,
        seed: u64,
    ) -> Result<Self> {
        let n_samples = data.nrows();
        if n_samples < 2 {
            return Err(Error::Fit(format!(
                "isolation forest needs at least 2 samples, got {}",
                n_samples
            )));
        }
        if n_estimators == 0 {
            return Err(Error::Fit("n_estimators must be positive".to_string()));
        }

        let sample_size = max_samples.clamp(2, n_samples);
        let max_depth = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(seed);

        let trees = (0..n_estimators)
            .map(|_| {
                let mut rows = rand::seq::index::sample(&mut rng, n_samples, sample_size).into_vec();
                IsolationTree::build(data, &mut rows, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            contamination,
            sample_size,
            n_features: data.ncols(),
            trees,
            offset: 0.0,
        };

        let raw = forest.score_samples(data);
        forest.offset = percentile(&raw, 100.0 * contamination);

        Ok(forest)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Raw scores `-2^(-E[h(x)] / c(n))`; lower means more anomalous
    pub fn score_samples(&self, data: &ArrayView2<f64>) -> Vec<f64> {
        let normalizer = average_path_length(self.sample_size);
        data.rows()
            .into_iter()
            .map(|sample| {
                let mean_path = self
                    .trees
                    .iter()
                    .map(|tree| tree.path_length(&sample))
                    .sum::<f64>()
                    / self.trees.len() as f64;
                -(2.0_f64.powf(-mean_path / normalizer))
            })
            .collect()
    }

    /// Shifted raw scores: negative = outlier, positive = inlier
    pub fn decision_function(&self, data: &ArrayView2<f64>) -> Vec<f64> {
        self.score_samples(data)
            .into_iter()
            .map(|s| s - self.offset)
            .collect()
    }
}
