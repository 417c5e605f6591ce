//! Held-out evaluation of a fitted model

use serde::{Deserialize, Serialize};
use tracing::info;

/// Binary confusion matrix, fraud as the positive class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: u64,
    pub false_positive: u64,
    pub false_negative: u64,
    pub true_positive: u64,
}

impl ConfusionMatrix {
    pub fn from_predictions(actual: &[bool], predicted: &[bool]) -> Self {
        let mut matrix = Self::default();
        for (&is_fraud, &flagged) in actual.iter().zip(predicted) {
            match (is_fraud, flagged) {
                (false, false) => matrix.true_negative += 1,
                (false, true) => matrix.false_positive += 1,
                (true, false) => matrix.false_negative += 1,
                (true, true) => matrix.true_positive += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> u64 {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }
}

/// Metrics computed on the held-out split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub samples: usize,
    pub confusion: ConfusionMatrix,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// None when the split holds only one class
    pub roc_auc: Option<f64>,
}

impl EvaluationReport {
    /// Build a report from true labels, model flags and fraud scores.
    ///
    /// Ratios with a zero denominator are reported as 0.
    pub fn compute(actual: &[bool], predicted: &[bool], scores: &[f64]) -> Self {
        let confusion = ConfusionMatrix::from_predictions(actual, predicted);
        let tp = confusion.true_positive as f64;
        let fp = confusion.false_positive as f64;
        let fn_ = confusion.false_negative as f64;

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = ratio(2.0 * precision * recall, precision + recall);
        let accuracy = ratio(
            (confusion.true_positive + confusion.true_negative) as f64,
            confusion.total() as f64,
        );

        Self {
            samples: actual.len(),
            confusion,
            accuracy,
            precision,
            recall,
            f1,
            roc_auc: roc_auc(actual, scores),
        }
    }

    pub fn log_summary(&self) {
        info!(
            samples = self.samples,
            accuracy = format!("{:.3}", self.accuracy),
            precision = format!("{:.3}", self.precision),
            recall = format!("{:.3}", self.recall),
            f1 = format!("{:.3}", self.f1),
            "Evaluation on held-out split"
        );
        info!(
            tn = self.confusion.true_negative,
            fp = self.confusion.false_positive,
            fn_ = self.confusion.false_negative,
            tp = self.confusion.true_positive,
            "Confusion matrix"
        );
        match self.roc_auc {
            Some(auc) => info!(roc_auc = format!("{:.3}", auc), "ROC AUC"),
            None => info!("ROC AUC undefined, held-out split has a single class"),
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Area under the ROC curve via the Mann-Whitney rank statistic.
///
/// Tied scores share their average rank.
pub fn roc_auc(actual: &[bool], scores: &[f64]) -> Option<f64> {
    let len = actual.len().min(scores.len());
    let positives = actual[..len].iter().filter(|&&a| a).count();
    let negatives = len - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..len).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; order.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; the group spans ranks start+1..=end
        let average = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = average;
        }
        start = end;
    }

    let positive_rank_sum: f64 = ranks
        .iter()
        .zip(actual)
        .filter(|(_, is_fraud)| **is_fraud)
        .map(|(rank, _)| rank)
        .sum();
    let p = positives as f64;
    let n = negatives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}
