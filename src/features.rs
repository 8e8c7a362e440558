//! Feature table assembly and standardization

use crate::error::TrajectoryError;
use crate::regression::PerSubjectFit;
use ndarray::{Array1, Array2, Axis};
use std::collections::HashSet;

/// Number of features per subject: intercept and slope
pub const N_FEATURES: usize = 2;

/// One subject's position in (intercept, slope) space
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub subject_id: String,
    pub intercept: f64,
    pub slope: f64,
}

/// Ordered per-subject feature rows, the unit that gets clustered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn subject_ids(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.subject_id.as_str()).collect()
    }

    /// Feature matrix of shape (n_subjects, 2): columns are intercept, slope
    pub fn to_matrix(&self) -> Array2<f64> {
        let mut matrix = Array2::zeros((self.rows.len(), N_FEATURES));
        for (mut out, row) in matrix.outer_iter_mut().zip(&self.rows) {
            out[0] = row.intercept;
            out[1] = row.slope;
        }
        matrix
    }
}

/// Reshape per-subject fits into a feature table, one row per fit
///
/// Input order is preserved. Fails on the first repeated subject id.
pub fn assemble_features(fits: &[PerSubjectFit]) -> Result<FeatureTable, TrajectoryError> {
    let mut seen = HashSet::with_capacity(fits.len());
    let mut rows = Vec::with_capacity(fits.len());

    for fit in fits {
        if !seen.insert(fit.subject_id.as_str()) {
            return Err(TrajectoryError::DuplicateKey {
                subject: fit.subject_id.clone(),
            });
        }
        rows.push(FeatureRow {
            subject_id: fit.subject_id.clone(),
            intercept: fit.intercept,
            slope: fit.slope,
        });
    }

    Ok(FeatureTable { rows })
}

/// Per-column standardization to zero mean and unit variance
///
/// Uses the population standard deviation. A constant column is centred
/// and left unscaled.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl StandardScaler {
    /// Learn column means and deviations from `data` (rows are samples)
    pub fn fit(data: &Array2<f64>) -> Self {
        let n_cols = data.ncols();
        if data.nrows() == 0 {
            return Self::identity(n_cols);
        }

        let mean = data
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_cols));
        let std = data
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });

        Self { mean, std }
    }

    /// A scaler that leaves data unchanged
    pub fn identity(n_cols: usize) -> Self {
        Self {
            mean: Array1::zeros(n_cols),
            std: Array1::ones(n_cols),
        }
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.mean) / &self.std
    }

    pub fn inverse_transform(&self, data: &Array2<f64>) -> Array2<f64> {
        data * &self.std + &self.mean
    }
}
