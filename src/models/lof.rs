//! Local Outlier Factor anomaly scoring
//!
//! A point's factor is the average local reachability density of its
//! neighbors divided by its own. Values near 1 sit inside a cluster;
//! larger values sit in sparser regions than their neighbors.

use crate::error::{Error, Result};
use crate::models::percentile;
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Keeps densities finite when neighbors coincide
const DENSITY_EPSILON: f64 = 1e-10;

/// Fitted LOF model holding its reference neighborhood
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalOutlierFactor {
    /// Expected anomaly rate used to place the threshold
    pub contamination: f64,
    /// Effective neighborhood size, at most `n_reference - 1`
    n_neighbors: usize,
    reference: Array2<f64>,
    /// Distance from each reference point to its k-th neighbor
    k_distances: Vec<f64>,
    /// Local reachability density of each reference point
    densities: Vec<f64>,
    /// Factor above which the model labels a point an outlier
    threshold: f64,
}

impl LocalOutlierFactor {
    /// Compute neighborhoods over `data` and calibrate the threshold.
    pub fn fit(data: &ArrayView2<f64>, n_neighbors: usize, contamination: f64) -> Result<Self> {
        let n_samples = data.nrows();
        if n_samples < 2 {
            return Err(Error::Fit(format!(
                "local outlier factor needs at least 2 samples, got {}",
                n_samples
            )));
        }
        let k = n_neighbors.clamp(1, n_samples - 1);

        let neighborhoods: Vec<Vec<(usize, f64)>> = (0..n_samples)
            .map(|i| nearest(data, &data.row(i), k, Some(i)))
            .collect();
        let k_distances: Vec<f64> = neighborhoods
            .iter()
            .map(|n| n.last().map(|&(_, d)| d).unwrap_or(0.0))
            .collect();
        let densities: Vec<f64> = neighborhoods
            .iter()
            .map(|n| reachability_density(n, &k_distances))
            .collect();

        let factors: Vec<f64> = neighborhoods
            .iter()
            .zip(&densities)
            .map(|(n, &own)| neighbor_density(n, &densities) / own)
            .collect();
        let threshold = percentile(&factors, 100.0 * (1.0 - contamination));

        Ok(Self {
            contamination,
            n_neighbors: k,
            reference: data.to_owned(),
            k_distances,
            densities,
            threshold,
        })
    }

    pub fn n_features(&self) -> usize {
        self.reference.ncols()
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Factor of each row relative to the reference set
    pub fn local_outlier_factor(&self, data: &ArrayView2<f64>) -> Vec<f64> {
        data.rows()
            .into_iter()
            .map(|sample| {
                let neighbors = nearest(&self.reference.view(), &sample, self.n_neighbors, None);
                let own = reachability_density(&neighbors, &self.k_distances);
                neighbor_density(&neighbors, &self.densities) / own
            })
            .collect()
    }
}

/// The `k` reference rows closest to `sample`, ties broken by row index
fn nearest(
    reference: &ArrayView2<f64>,
    sample: &ArrayView1<f64>,
    k: usize,
    exclude: Option<usize>,
) -> Vec<(usize, f64)> {
    let mut distances: Vec<(usize, f64)> = reference
        .rows()
        .into_iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != exclude)
        .map(|(i, row)| (i, euclidean(&row, sample)))
        .collect();

    distances.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
    distances.truncate(k);
    distances
}

fn euclidean(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Inverse mean reachability distance to the given neighbors
fn reachability_density(neighbors: &[(usize, f64)], k_distances: &[f64]) -> f64 {
    let total: f64 = neighbors
        .iter()
        .map(|&(j, distance)| distance.max(k_distances[j]))
        .sum();
    1.0 / (total / neighbors.len() as f64 + DENSITY_EPSILON)
}

fn neighbor_density(neighbors: &[(usize, f64)], densities: &[f64]) -> f64 {
    neighbors.iter().map(|&(j, _)| densities[j]).sum::<f64>() / neighbors.len() as f64
}
