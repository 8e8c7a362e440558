//! Run configuration.
//!
//! [`PipelineConfig`] gathers everything one analysis run needs: input column
//! names, k-means settings, the sparse-subject policy and the plot theme. It
//! is serializable so a run can be described in a JSON file and then
//! adjusted from the command line.
//!
//! ```rust
//! use trajforge::config::PipelineConfig;
//!
//! let cfg = PipelineConfig::default();
//! cfg.validate().unwrap();
//! assert_eq!(cfg.cluster.n_clusters, 2);
//! ```

use crate::data::ColumnNames;
use crate::model::ClusterConfig;
use crate::regression::SparseSubjectPolicy;
use crate::viz::PlotTheme;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete configuration for one trajectory clustering run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub columns: ColumnNames,
    pub cluster: ClusterConfig,
    pub sparse_policy: SparseSubjectPolicy,
    pub theme: PlotTheme,
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; omitted fields take defaults
    pub fn from_json(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that do not depend on the data
    ///
    /// The cluster count against the subject count is checked at fit time.
    pub fn validate(&self) -> crate::Result<()> {
        let cluster = &self.cluster;
        if cluster.n_clusters == 0 {
            anyhow::bail!("n_clusters must be at least 1");
        }
        if cluster.max_iters == 0 {
            anyhow::bail!("max_iters must be at least 1");
        }
        if cluster.n_runs == 0 {
            anyhow::bail!("n_runs must be at least 1");
        }
        if !(cluster.tolerance.is_finite() && cluster.tolerance > 0.0) {
            anyhow::bail!("tolerance must be a positive number, got {}", cluster.tolerance);
        }

        let columns = &self.columns;
        for (role, name) in [
            ("subject", &columns.subject),
            ("time", &columns.time),
            ("value", &columns.value),
        ] {
            if name.trim().is_empty() {
                anyhow::bail!("{} column name must not be empty", role);
            }
        }

        self.theme.validate()
    }
}
