//! Command-line interface definitions and argument parsing

use crate::config::PipelineConfig;
use crate::regression::SparseSubjectPolicy;
use clap::Parser;
use std::path::PathBuf;

/// Cluster subjects by the intercept and slope of their trajectories
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file (long format: subject, time, value)
    #[arg(short, long, default_value = "data.csv")]
    pub input: PathBuf,

    /// Number of clusters for K-Means [default: 2]
    #[arg(short = 'k', long)]
    pub clusters: Option<usize>,

    /// Output path for the trajectory plot; sibling files get _features and _sizes suffixes
    #[arg(short, long, default_value = "trajectories.png")]
    pub output: PathBuf,

    /// JSON configuration file; command-line flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Column holding the subject identifier [default: subject]
    #[arg(long)]
    pub subject_col: Option<String>,

    /// Column holding the time index [default: time]
    #[arg(long)]
    pub time_col: Option<String>,

    /// Column holding the measured value [default: value]
    #[arg(long)]
    pub value_col: Option<String>,

    /// Seed for centroid initialization, for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Maximum iterations for K-Means [default: 300]
    #[arg(long)]
    pub max_iters: Option<usize>,

    /// Tolerance for K-Means convergence [default: 1e-4]
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Cluster on raw intercept and slope instead of standardized values
    #[arg(long)]
    pub no_standardize: bool,

    /// Skip subjects with fewer than two observations instead of failing
    #[arg(long)]
    pub skip_sparse: bool,

    /// Prediction: provide intercept,slope as comma-separated string
    /// Example: --predict "1.5,-0.2"
    #[arg(short, long)]
    pub predict: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the run configuration: config file (or defaults), then flag overrides
    pub fn resolve_config(&self) -> crate::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(k) = self.clusters {
            config.cluster.n_clusters = k;
        }
        if let Some(max_iters) = self.max_iters {
            config.cluster.max_iters = max_iters;
        }
        if let Some(tolerance) = self.tolerance {
            config.cluster.tolerance = tolerance;
        }
        if self.seed.is_some() {
            config.cluster.seed = self.seed;
        }
        if self.no_standardize {
            config.cluster.standardize = false;
        }
        if self.skip_sparse {
            config.sparse_policy = SparseSubjectPolicy::Skip;
        }
        if let Some(name) = &self.subject_col {
            config.columns.subject = name.clone();
        }
        if let Some(name) = &self.time_col {
            config.columns.time = name.clone();
        }
        if let Some(name) = &self.value_col {
            config.columns.value = name.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse intercept and slope from the predict string
    /// Expected format: "intercept,slope"
    pub fn parse_predict_values(&self) -> crate::Result<Option<(f64, f64)>> {
        let Some(predict_str) = &self.predict else {
            return Ok(None);
        };

        let parts: Vec<&str> = predict_str.split(',').collect();
        if parts.len() != 2 {
            anyhow::bail!("Predict values must be in format 'intercept,slope'");
        }

        let intercept: f64 = parts[0]
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid intercept value: {}", parts[0]))?;
        let slope: f64 = parts[1]
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid slope value: {}", parts[1]))?;

        Ok(Some((intercept, slope)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("trajforge").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_predict_values() {
        let mut args = parse(&["--predict", "1.5,-0.25"]);
        assert_eq!(args.parse_predict_values().unwrap(), Some((1.5, -0.25)));

        args.predict = None;
        assert_eq!(args.parse_predict_values().unwrap(), None);

        args.predict = Some("invalid".to_string());
        assert!(args.parse_predict_values().is_err());

        args.predict = Some("1.0,abc".to_string());
        assert!(args.parse_predict_values().is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = parse(&[
            "-k",
            "3",
            "--seed",
            "11",
            "--no-standardize",
            "--skip-sparse",
            "--time-col",
            "week",
        ]);

        let config = args.resolve_config().unwrap();

        assert_eq!(config.cluster.n_clusters, 3);
        assert_eq!(config.cluster.seed, Some(11));
        assert!(!config.cluster.standardize);
        assert_eq!(config.sparse_policy, SparseSubjectPolicy::Skip);
        assert_eq!(config.columns.time, "week");
        assert_eq!(config.columns.subject, "subject");
    }

    #[test]
    fn test_zero_clusters_rejected() {
        let args = parse(&["-k", "0"]);
        assert!(args.resolve_config().is_err());
    }
}
