//! Per-subject ordinary least squares trend estimation

use crate::data::{group_by_subject, Observation};
use crate::error::TrajectoryError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Minimum number of observations needed to fit a line
pub const MIN_OBSERVATIONS: usize = 2;

/// Least-squares line fitted to one subject's series
#[derive(Debug, Clone, PartialEq)]
pub struct PerSubjectFit {
    pub subject_id: String,
    pub intercept: f64,
    pub slope: f64,
    /// Number of observations the line was fitted to
    pub n_observations: usize,
}

impl PerSubjectFit {
    /// Value of the fitted line at `time`
    pub fn predict(&self, time: f64) -> f64 {
        self.intercept + self.slope * time
    }
}

/// What to do with a subject that has fewer than [`MIN_OBSERVATIONS`] points
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SparseSubjectPolicy {
    /// Abort with `TrajectoryError::InsufficientData`
    #[default]
    Fail,
    /// Leave the subject out of the fit and log a warning
    Skip,
}

/// Fit `value = intercept + slope * time` to one subject's points
///
/// # Arguments
/// * `subject_id` - Identifier carried into the result and any error
/// * `points` - `(time, value)` pairs; times must be distinct
///
/// # Returns
/// * `PerSubjectFit` minimizing the sum of squared residuals
pub fn fit_subject(subject_id: &str, points: &[(f64, f64)]) -> Result<PerSubjectFit, TrajectoryError> {
    if points.len() < MIN_OBSERVATIONS {
        return Err(TrajectoryError::InsufficientData {
            subject: subject_id.to_string(),
            observations: points.len(),
            required: MIN_OBSERVATIONS,
        });
    }

    if points.iter().any(|(t, v)| !t.is_finite() || !v.is_finite()) {
        return Err(TrajectoryError::NonFiniteValue {
            subject: subject_id.to_string(),
        });
    }

    let mut times: Vec<f64> = points.iter().map(|&(t, _)| t).collect();
    times.sort_by(f64::total_cmp);
    if let Some(pair) = times.windows(2).find(|w| w[0] == w[1]) {
        return Err(TrajectoryError::DuplicateTimeIndex {
            subject: subject_id.to_string(),
            time: pair[0],
        });
    }

    let n = points.len() as f64;
    let mean_t = points.iter().map(|&(t, _)| t).sum::<f64>() / n;
    let mean_v = points.iter().map(|&(_, v)| v).sum::<f64>() / n;

    // Centred sums keep the estimate stable for large time offsets
    let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), &(t, v)| {
        let dt = t - mean_t;
        (sxy + dt * (v - mean_v), sxx + dt * dt)
    });

    let slope = sxy / sxx;
    let intercept = mean_v - slope * mean_t;

    Ok(PerSubjectFit {
        subject_id: subject_id.to_string(),
        intercept,
        slope,
        n_observations: points.len(),
    })
}

/// Fit an independent trend line to every subject
///
/// Subjects are fitted in ascending id order. Under
/// [`SparseSubjectPolicy::Skip`] subjects with too few points are dropped;
/// every other error aborts the run.
pub fn fit_subjects(
    observations: &[Observation],
    policy: SparseSubjectPolicy,
) -> Result<Vec<PerSubjectFit>, TrajectoryError> {
    let groups = group_by_subject(observations);
    let mut fits = Vec::with_capacity(groups.len());
    let mut skipped = 0usize;

    for (subject, points) in &groups {
        match fit_subject(subject, points) {
            Ok(fit) => {
                debug!(
                    subject = %fit.subject_id,
                    intercept = fit.intercept,
                    slope = fit.slope,
                    "fitted subject trend"
                );
                fits.push(fit);
            }
            Err(TrajectoryError::InsufficientData { observations, .. })
                if policy == SparseSubjectPolicy::Skip =>
            {
                warn!(%subject, observations, "skipping subject with too few observations");
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    info!(fitted = fits.len(), skipped, "per-subject regression complete");
    Ok(fits)
}
