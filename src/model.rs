//! K-Means clustering of subjects in (intercept, slope) space

use crate::error::TrajectoryError;
use crate::features::{FeatureTable, StandardScaler, N_FEATURES};
use linfa::prelude::*;
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// K-Means settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Number of clusters (k)
    pub n_clusters: usize,
    /// Maximum Lloyd iterations, applied to both the fit and the refinement
    pub max_iters: usize,
    /// Convergence tolerance for the k-means fit
    pub tolerance: f64,
    /// Number of k-means++ restarts; the lowest-inertia run wins
    pub n_runs: usize,
    /// Standardize intercept and slope before measuring distances
    pub standardize: bool,
    /// RNG seed for centroid seeding; `None` draws from OS entropy
    pub seed: Option<u64>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            n_clusters: 2,
            max_iters: 300,
            tolerance: 1e-4,
            n_runs: 10,
            standardize: true,
            seed: None,
        }
    }
}

/// Cluster label for one subject; `cluster_id` runs from 1 to k
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAssignment {
    pub subject_id: String,
    pub cluster_id: usize,
}

/// Fitted clustering of a feature table
#[derive(Debug, Clone)]
pub struct ClusterModel {
    /// Number of clusters
    pub n_clusters: usize,
    /// Subject ids in feature-table order
    pub subject_ids: Vec<String>,
    /// Zero-based cluster index per subject
    pub labels: Array1<usize>,
    /// Cluster centroids in clustering space (standardized if enabled)
    pub centroids: Array2<f64>,
    /// Points as clustered, one row per subject
    pub points: Array2<f64>,
    /// Scaler applied before clustering (identity when disabled)
    pub scaler: StandardScaler,
    /// Within-cluster sum of squares
    pub inertia: f64,
    /// Refinement passes run after the k-means fit
    pub refinement_passes: usize,
}

impl ClusterModel {
    /// One assignment per subject, in feature-table order
    pub fn assignments(&self) -> Vec<ClusterAssignment> {
        self.subject_ids
            .iter()
            .zip(self.labels.iter())
            .map(|(subject_id, &label)| ClusterAssignment {
                subject_id: subject_id.clone(),
                cluster_id: label + 1,
            })
            .collect()
    }

    /// Predict the 1-based cluster id for a new (intercept, slope) pair
    pub fn predict(&self, intercept: f64, slope: f64) -> Result<usize, TrajectoryError> {
        if !intercept.is_finite() || !slope.is_finite() {
            return Err(TrajectoryError::NonFiniteFeatures { intercept, slope });
        }

        let raw = Array2::from_shape_fn((1, N_FEATURES), |(_, j)| if j == 0 { intercept } else { slope });
        let scaled = self.scaler.transform(&raw);
        Ok(nearest_centroid(&scaled.row(0), &self.centroids) + 1)
    }

    /// Get cluster sizes, indexed by zero-based cluster
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in self.labels.iter() {
            if label < self.n_clusters {
                sizes[label] += 1;
            }
        }
        sizes
    }

    /// Centroids expressed in the original intercept and slope units
    pub fn centroids_in_feature_space(&self) -> Array2<f64> {
        self.scaler.inverse_transform(&self.centroids)
    }

    /// Mean silhouette coefficient over the first `sample_size` points
    pub fn silhouette_score(&self, sample_size: usize) -> f64 {
        let n_samples = self.points.nrows().min(sample_size);
        if n_samples < 2 {
            return 0.0;
        }

        let mut silhouette_sum = 0.0;

        for i in 0..n_samples {
            let point = self.points.row(i);
            let cluster_label = self.labels[i];

            let mut same_cluster_distances = Vec::new();
            let mut other_cluster_distances: Vec<Vec<f64>> = vec![Vec::new(); self.n_clusters];

            for j in 0..n_samples {
                if i == j {
                    continue;
                }

                let distance = euclidean_distance(&point, &self.points.row(j));
                let other_label = self.labels[j];

                if other_label == cluster_label {
                    same_cluster_distances.push(distance);
                } else if other_label < self.n_clusters {
                    other_cluster_distances[other_label].push(distance);
                }
            }

            // a(i): mean distance within own cluster
            let a_i = if same_cluster_distances.is_empty() {
                0.0
            } else {
                same_cluster_distances.iter().sum::<f64>() / same_cluster_distances.len() as f64
            };

            // b(i): smallest mean distance to another cluster
            let b_i = other_cluster_distances
                .iter()
                .filter(|distances| !distances.is_empty())
                .map(|distances| distances.iter().sum::<f64>() / distances.len() as f64)
                .fold(f64::INFINITY, f64::min);

            let silhouette_i = if b_i.is_infinite() || (a_i == 0.0 && b_i == 0.0) {
                0.0
            } else {
                (b_i - a_i) / a_i.max(b_i)
            };

            silhouette_sum += silhouette_i;
        }

        silhouette_sum / n_samples as f64
    }
}

/// Partition subjects into `config.n_clusters` groups
///
/// Centroids are seeded with k-means++ and fitted by linfa, then refined
/// with explicit Lloyd passes until assignments stop changing so that the
/// final labels are exactly nearest-centroid (ties go to the lowest index).
///
/// # Returns
/// * Fitted `ClusterModel`; `assignments()` yields ids in `1..=k`
pub fn fit_clusters(
    table: &FeatureTable,
    config: &ClusterConfig,
) -> Result<ClusterModel, TrajectoryError> {
    let n_subjects = table.len();
    let k = config.n_clusters;

    if k == 0 {
        return Err(TrajectoryError::Clustering {
            requested: k,
            subjects: n_subjects,
            reason: "at least one cluster is required".to_string(),
        });
    }
    if k > n_subjects {
        return Err(TrajectoryError::Clustering {
            requested: k,
            subjects: n_subjects,
            reason: "more clusters requested than subjects available".to_string(),
        });
    }

    let raw = table.to_matrix();
    let scaler = if config.standardize {
        StandardScaler::fit(&raw)
    } else {
        StandardScaler::identity(N_FEATURES)
    };
    let points = scaler.transform(&raw);

    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let dataset = DatasetBase::from(points.clone());
    let kmeans: KMeans<f64, L2Dist> = KMeans::params_with(k, rng, L2Dist)
        .max_n_iterations(config.max_iters as u64)
        .tolerance(config.tolerance)
        .n_runs(config.n_runs)
        .fit(&dataset)?;

    let (labels, centroids, refinement_passes) =
        refine(&points, kmeans.centroids().clone(), config.max_iters);
    let inertia = compute_inertia(&points, &labels, &centroids);

    debug!(refinement_passes, "k-means refinement finished");
    info!(clusters = k, subjects = n_subjects, inertia, "clustering complete");

    Ok(ClusterModel {
        n_clusters: k,
        subject_ids: table.subject_ids().into_iter().map(str::to_string).collect(),
        labels,
        centroids,
        points,
        scaler,
        inertia,
        refinement_passes,
    })
}

/// Lloyd passes from `centroids` until labels are stable or `max_passes` is hit
fn refine(
    points: &Array2<f64>,
    mut centroids: Array2<f64>,
    max_passes: usize,
) -> (Array1<usize>, Array2<f64>, usize) {
    let mut labels = assign_points(points, &centroids);
    let mut passes = 0;

    while passes < max_passes {
        passes += 1;
        centroids = recompute_centroids(points, &labels, &centroids);
        let next = assign_points(points, &centroids);
        if next == labels {
            break;
        }
        labels = next;
    }

    (labels, centroids, passes)
}

fn assign_points(points: &Array2<f64>, centroids: &Array2<f64>) -> Array1<usize> {
    points
        .outer_iter()
        .map(|point| nearest_centroid(&point, centroids))
        .collect()
}

/// Index of the closest centroid; the lowest index wins a tie
fn nearest_centroid(point: &ArrayView1<f64>, centroids: &Array2<f64>) -> usize {
    let mut min_distance = f64::INFINITY;
    let mut closest_cluster = 0;

    for (cluster_idx, centroid) in centroids.outer_iter().enumerate() {
        let distance = squared_distance(point, &centroid);
        if distance < min_distance {
            min_distance = distance;
            closest_cluster = cluster_idx;
        }
    }

    closest_cluster
}

/// Member means per cluster; an empty cluster keeps its previous centroid
fn recompute_centroids(
    points: &Array2<f64>,
    labels: &Array1<usize>,
    previous: &Array2<f64>,
) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros(previous.raw_dim());
    let mut counts = vec![0usize; previous.nrows()];

    for (point, &label) in points.outer_iter().zip(labels.iter()) {
        let mut row = sums.row_mut(label);
        row += &point;
        counts[label] += 1;
    }

    let mut centroids = previous.clone();
    for (idx, &count) in counts.iter().enumerate() {
        if count > 0 {
            let mean = &sums.row(idx) / count as f64;
            centroids.row_mut(idx).assign(&mean);
        }
    }
    centroids
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(points: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    points
        .outer_iter()
        .zip(labels.iter())
        .filter(|(_, &cluster)| cluster < centroids.nrows())
        .map(|(point, &cluster)| squared_distance(&point, &centroids.row(cluster)))
        .sum()
}

fn squared_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn euclidean_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    squared_distance(a, b).sqrt()
}
