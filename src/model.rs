//! K-Means cluster assigner

use std::collections::HashSet;

use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SegmentError;

/// Fixed clustering settings; chosen once, never searched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansSettings {
    pub n_clusters: usize,
    pub seed: u64,
    /// Restarts; the run with the lowest inertia wins.
    pub n_runs: usize,
    pub max_iterations: u64,
    pub tolerance: f64,
}

impl Default for KMeansSettings {
    fn default() -> Self {
        Self {
            n_clusters: 4,
            seed: 42,
            n_runs: 10,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }
}

/// Trained cluster centers in encoded space plus the nearest-center rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterModel {
    /// Number of clusters
    pub n_clusters: usize,
    /// Cluster centroids in encoded space, one row per cluster
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares on the training data
    pub inertia: f64,
}

impl ClusterModel {
    /// Dimension of the encoded space.
    pub fn dimension(&self) -> usize {
        self.centroids.ncols()
    }

    /// Id of the nearest centroid; ties go to the lowest id.
    pub fn predict(&self, features: ArrayView1<f64>) -> crate::Result<usize> {
        if features.len() != self.dimension() {
            return Err(SegmentError::DimensionMismatch {
                expected: self.dimension(),
                actual: features.len(),
            });
        }

        let mut min_distance = f64::INFINITY;
        let mut closest_cluster = 0;

        for (cluster_idx, centroid) in self.centroids.outer_iter().enumerate() {
            let distance = squared_distance(&features, &centroid);
            if distance < min_distance {
                min_distance = distance;
                closest_cluster = cluster_idx;
            }
        }

        Ok(closest_cluster)
    }

    /// Assign every row of `features`.
    pub fn assign(&self, features: &Array2<f64>) -> crate::Result<Vec<usize>> {
        features
            .outer_iter()
            .map(|row| self.predict(row))
            .collect()
    }

    /// Member count per cluster for a set of assignments.
    pub fn cluster_sizes(&self, labels: &[usize]) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in labels {
            if label < self.n_clusters {
                sizes[label] += 1;
            }
        }
        sizes
    }
}

/// Fit K-Means on encoded feature vectors.
///
/// The seed fixes center initialisation, so identical input always trains to
/// the same centroids.
///
/// # Arguments
/// * `features` - One encoded vector per row
/// * `settings` - Cluster count, seed, restarts, iteration cap and tolerance
///
/// # Returns
/// * Fitted `ClusterModel` with centroids and inertia
/// * `DegenerateInput` when there are fewer distinct vectors than clusters
pub fn fit_kmeans(features: &Array2<f64>, settings: &KMeansSettings) -> crate::Result<ClusterModel> {
    let n_clusters = settings.n_clusters;
    let distinct = count_distinct_rows(features);
    if n_clusters == 0 || distinct < n_clusters {
        return Err(SegmentError::DegenerateInput {
            requested: n_clusters,
            distinct,
        });
    }

    let n_samples = features.nrows();
    let targets: Array1<usize> = Array1::zeros(n_samples);
    let dataset = Dataset::new(features.clone(), targets);

    let rng = StdRng::seed_from_u64(settings.seed);
    let model: KMeans<f64, L2Dist> = KMeans::params_with(n_clusters, rng, L2Dist)
        .n_runs(settings.n_runs.max(1))
        .max_n_iterations(settings.max_iterations)
        .tolerance(settings.tolerance)
        .fit(&dataset)
        .map_err(|e| SegmentError::Clustering(e.to_string()))?;

    let centroids = model.centroids().clone();
    let mut fitted = ClusterModel {
        n_clusters,
        centroids,
        inertia: 0.0,
    };
    let labels = fitted.assign(features)?;
    fitted.inertia = compute_inertia(features, &labels, &fitted.centroids);

    debug!(
        n_samples,
        n_clusters,
        inertia = fitted.inertia,
        "k-means fitted"
    );

    Ok(fitted)
}

/// Within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &[usize], centroids: &Array2<f64>) -> f64 {
    features
        .outer_iter()
        .zip(labels)
        .filter(|(_, cluster)| **cluster < centroids.nrows())
        .map(|(point, &cluster)| squared_distance(&point, &centroids.row(cluster)))
        .sum()
}

fn squared_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn count_distinct_rows(features: &Array2<f64>) -> usize {
    features
        .outer_iter()
        // `+ 0.0` folds -0.0 into 0.0
        .map(|row| row.iter().map(|v| (v + 0.0).to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}
