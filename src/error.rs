//! Error types for the trajectory clustering stages.
//!
//! The estimator, assembler, assigner and annotation join all return
//! [`TrajectoryError`]. Loading, rendering and the CLI work in terms of
//! [`crate::Result`] (anyhow) and absorb these through `?`.

use thiserror::Error;

/// Errors raised by the core analysis stages.
#[derive(Debug, Error)]
pub enum TrajectoryError {
    /// A subject has too few observations to fit a line.
    #[error("subject '{subject}' has {observations} observation(s); at least {required} are required")]
    InsufficientData {
        subject: String,
        observations: usize,
        required: usize,
    },

    /// The same subject identifier appeared twice where one row per subject is expected.
    #[error("duplicate subject id '{subject}'")]
    DuplicateKey { subject: String },

    /// A subject's series repeats a time index.
    #[error("subject '{subject}' has more than one observation at time {time}")]
    DuplicateTimeIndex { subject: String, time: f64 },

    /// A time or value was NaN or infinite.
    #[error("subject '{subject}' has a non-finite time or value")]
    NonFiniteValue { subject: String },

    /// A feature pair submitted for prediction was NaN or infinite.
    #[error("cannot predict a cluster for non-finite features (intercept {intercept}, slope {slope})")]
    NonFiniteFeatures { intercept: f64, slope: f64 },

    /// The requested cluster count cannot be honoured.
    #[error("cannot form {requested} cluster(s) from {subjects} subject(s): {reason}")]
    Clustering {
        requested: usize,
        subjects: usize,
        reason: String,
    },

    /// An observation refers to a subject with no cluster assignment.
    #[error("no cluster assignment for subject '{subject}'")]
    MissingAssignment { subject: String },

    /// The underlying k-means fit failed.
    #[error("k-means fit failed: {0}")]
    KMeans(#[from] linfa_clustering::KMeansError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_subject() {
        let err = TrajectoryError::InsufficientData {
            subject: "S7".to_string(),
            observations: 1,
            required: 2,
        };
        assert_eq!(
            err.to_string(),
            "subject 'S7' has 1 observation(s); at least 2 are required"
        );

        let err = TrajectoryError::Clustering {
            requested: 5,
            subjects: 3,
            reason: "more clusters than subjects".to_string(),
        };
        assert!(err.to_string().contains("5 cluster(s) from 3 subject(s)"));
    }
}
