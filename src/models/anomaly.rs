//! Strategy-dispatching anomaly model

use crate::config::{AnomalyStrategy, ModelConfig};
use crate::error::{Error, Result};
use crate::models::isolation_forest::IsolationForest;
use crate::models::lof::LocalOutlierFactor;
use ndarray::{ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Raw-factor cutoff for scoring a single donation with LOF.
///
/// A lone point has no batch to be ranked against, so the model's own
/// calibrated label is bypassed. The value 0.5 has not been validated
/// against real donation data.
pub const SINGLE_POINT_LOF_CUTOFF: f64 = 0.5;

/// Inlier/outlier label, +1 / -1 on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    Inlier,
    Outlier,
}

impl Label {
    pub fn is_outlier(&self) -> bool {
        matches!(self, Label::Outlier)
    }

    pub fn as_sign(&self) -> i8 {
        match self {
            Label::Inlier => 1,
            Label::Outlier => -1,
        }
    }
}

/// Labels and fraud scores for a batch, in row order
#[derive(Debug, Clone, PartialEq)]
pub struct Scores {
    pub labels: Vec<Label>,
    /// Higher = more anomalous
    pub fraud_scores: Vec<f64>,
}

/// Fitted anomaly model, one variant per strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyModel {
    IsolationForest(IsolationForest),
    LocalOutlierFactor(LocalOutlierFactor),
}

impl AnomalyModel {
    /// Fit the configured strategy on a feature matrix
    pub fn fit(config: &ModelConfig, features: &ArrayView2<f64>) -> Result<Self> {
        let model = match config.algorithm {
            AnomalyStrategy::IsolationForest => AnomalyModel::IsolationForest(IsolationForest::fit(
                features,
                config.n_estimators,
                config.max_samples,
                config.contamination,
                config.random_state,
            )?),
            AnomalyStrategy::Lof => AnomalyModel::LocalOutlierFactor(LocalOutlierFactor::fit(
                features,
                config.n_neighbors,
                config.contamination,
            )?),
        };

        info!(
            strategy = model.strategy().as_str(),
            samples = features.nrows(),
            features = features.ncols(),
            "Anomaly model fitted"
        );
        Ok(model)
    }

    pub fn strategy(&self) -> AnomalyStrategy {
        match self {
            AnomalyModel::IsolationForest(_) => AnomalyStrategy::IsolationForest,
            AnomalyModel::LocalOutlierFactor(_) => AnomalyStrategy::Lof,
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            AnomalyModel::IsolationForest(forest) => forest.n_features(),
            AnomalyModel::LocalOutlierFactor(lof) => lof.n_features(),
        }
    }

    /// Score a batch with the model's own calibrated labels
    pub fn score(&self, features: &ArrayView2<f64>) -> Result<Scores> {
        if features.ncols() != self.n_features() {
            return Err(Error::Inference(format!(
                "expected {} features, got {}",
                self.n_features(),
                features.ncols()
            )));
        }

        let (labels, fraud_scores) = match self {
            AnomalyModel::IsolationForest(forest) => {
                // Negate the decision function so higher = more anomalous
                let fraud_scores: Vec<f64> = forest
                    .decision_function(features)
                    .into_iter()
                    .map(|d| -d)
                    .collect();
                let labels: Vec<Label> = fraud_scores
                    .iter()
                    .map(|&s| if s > 0.0 { Label::Outlier } else { Label::Inlier })
                    .collect();
                (labels, fraud_scores)
            }
            AnomalyModel::LocalOutlierFactor(lof) => {
                let fraud_scores = lof.local_outlier_factor(features);
                let labels: Vec<Label> = fraud_scores
                    .iter()
                    .map(|&s| {
                        if s > lof.threshold() {
                            Label::Outlier
                        } else {
                            Label::Inlier
                        }
                    })
                    .collect();
                (labels, fraud_scores)
            }
        };

        if let Some(bad) = fraud_scores.iter().find(|s| !s.is_finite()) {
            return Err(Error::Inference(format!("model produced non-finite score {}", bad)));
        }

        Ok(Scores {
            labels,
            fraud_scores,
        })
    }

    /// Score one feature vector on the synchronous prediction path.
    pub fn score_one(&self, features: &ArrayView1<f64>) -> Result<(Label, f64)> {
        let batch = features.view().insert_axis(Axis(0));
        let scores = self.score(&batch)?;
        let fraud_score = scores.fraud_scores[0];

        let label = match self {
            AnomalyModel::IsolationForest(_) => scores.labels[0],
            AnomalyModel::LocalOutlierFactor(_) => {
                if fraud_score > SINGLE_POINT_LOF_CUTOFF {
                    Label::Outlier
                } else {
                    Label::Inlier
                }
            }
        };
        Ok((label, fraud_score))
    }
}
