//! Observation loading using Polars

use anyhow::Context;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// One repeated measurement of a subject
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub subject_id: String,
    pub time: f64,
    pub value: f64,
}

impl Observation {
    pub fn new(subject_id: impl Into<String>, time: f64, value: f64) -> Self {
        Self {
            subject_id: subject_id.into(),
            time,
            value,
        }
    }
}

/// Names of the input columns holding subject, time index and measured value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub subject: String,
    pub time: String,
    pub value: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            subject: "subject".to_string(),
            time: "time".to_string(),
            value: "value".to_string(),
        }
    }
}

/// Load long-format observations from a CSV file
///
/// # Arguments
/// * `file_path` - Path to a CSV file with a header row
/// * `columns` - Which columns hold the subject id, time index and value
///
/// Empty cells drop their row; a time or value that does not parse as a
/// number fails the load.
///
/// # Returns
/// * One `Observation` per row with all three fields present
pub fn load_observations(
    file_path: impl AsRef<Path>,
    columns: &ColumnNames,
) -> crate::Result<Vec<Observation>> {
    let file_path = file_path.as_ref();

    let df = LazyCsvReader::new(file_path)
        .with_has_header(true)
        .finish()
        .with_context(|| format!("failed to open {}", file_path.display()))?
        .select([
            col(columns.subject.as_str())
                .cast(DataType::String)
                .alias("subject"),
            col(columns.time.as_str())
                .strict_cast(DataType::Float64)
                .alias("time"),
            col(columns.value.as_str())
                .strict_cast(DataType::Float64)
                .alias("value"),
        ])
        .filter(
            col("subject")
                .is_not_null()
                .and(col("time").is_not_null())
                .and(col("value").is_not_null()),
        )
        .collect()
        .with_context(|| {
            format!(
                "failed to read columns ({}, {}, {}) from {}",
                columns.subject,
                columns.time,
                columns.value,
                file_path.display()
            )
        })?;

    if df.height() == 0 {
        anyhow::bail!("No valid observations found in {}", file_path.display());
    }

    let subjects = df.column("subject")?.str()?;
    let times = df.column("time")?.f64()?;
    let values = df.column("value")?.f64()?;

    let observations: Vec<Observation> = subjects
        .into_no_null_iter()
        .zip(times.into_no_null_iter())
        .zip(values.into_no_null_iter())
        .map(|((subject, time), value)| Observation::new(subject, time, value))
        .collect();

    debug!(
        rows = observations.len(),
        path = %file_path.display(),
        "loaded observations"
    );

    Ok(observations)
}

/// Group `(time, value)` pairs by subject, subjects in ascending order
pub fn group_by_subject(observations: &[Observation]) -> BTreeMap<String, Vec<(f64, f64)>> {
    let mut groups: BTreeMap<String, Vec<(f64, f64)>> = BTreeMap::new();
    for obs in observations {
        groups
            .entry(obs.subject_id.clone())
            .or_default()
            .push((obs.time, obs.value));
    }
    groups
}
