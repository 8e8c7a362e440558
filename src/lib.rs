//! trajforge: cluster subjects by the shape of their longitudinal trajectories
//!
//! Each subject's repeated measurements get an ordinary least squares trend
//! line; the resulting (intercept, slope) pairs are clustered with K-Means
//! and the labels are joined back onto the observations for plotting.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod regression;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use config::PipelineConfig;
pub use data::{group_by_subject, load_observations, ColumnNames, Observation};
pub use error::TrajectoryError;
pub use features::{assemble_features, FeatureRow, FeatureTable, StandardScaler};
pub use model::{fit_clusters, ClusterAssignment, ClusterConfig, ClusterModel};
pub use pipeline::{annotate, run_pipeline, AnnotatedObservation, PipelineOutput};
pub use regression::{fit_subject, fit_subjects, PerSubjectFit, SparseSubjectPolicy};
pub use viz::{generate_visualization_report, PlotTheme, TrajectoryChart};

/// Common result type used by I/O-facing code
pub type Result<T> = anyhow::Result<T>;
