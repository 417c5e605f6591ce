//! Anomaly models and artifact persistence

pub mod anomaly;
pub mod isolation_forest;
pub mod loader;
pub mod lof;

pub use anomaly::{AnomalyModel, Label, Scores, SINGLE_POINT_LOF_CUTOFF};
pub use isolation_forest::IsolationForest;
pub use loader::{ArtifactStore, FittedPipeline};
pub use lof::LocalOutlierFactor;

/// Percentile with linear interpolation between closest ranks.
///
/// `q` is in [0, 100]. Returns NaN for an empty slice.
pub(crate) fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert!((percentile(&values, 50.0) - 2.5).abs() < 1e-12);
        assert!((percentile(&values, 10.0) - 1.3).abs() < 1e-12);
    }
}
