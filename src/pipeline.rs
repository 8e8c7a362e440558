//! Stage orchestration: observations -> fits -> features -> clusters -> annotated set

use crate::config::PipelineConfig;
use crate::data::Observation;
use crate::error::TrajectoryError;
use crate::features::{assemble_features, FeatureTable};
use crate::model::{fit_clusters, ClusterAssignment, ClusterModel};
use crate::regression::{fit_subjects, PerSubjectFit};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// An observation labelled with its subject's cluster
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedObservation {
    pub subject_id: String,
    pub time: f64,
    pub value: f64,
    pub cluster_id: usize,
}

/// Everything one run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub fits: Vec<PerSubjectFit>,
    pub features: FeatureTable,
    pub model: ClusterModel,
    pub assignments: Vec<ClusterAssignment>,
    pub annotated: Vec<AnnotatedObservation>,
}

/// Join observations to their subject's assignment (many-to-one)
///
/// Fails if an observation has no assignment or a subject is assigned twice.
pub fn annotate(
    observations: &[Observation],
    assignments: &[ClusterAssignment],
) -> Result<Vec<AnnotatedObservation>, TrajectoryError> {
    let mut lookup: HashMap<&str, usize> = HashMap::with_capacity(assignments.len());
    for assignment in assignments {
        if lookup
            .insert(assignment.subject_id.as_str(), assignment.cluster_id)
            .is_some()
        {
            return Err(TrajectoryError::DuplicateKey {
                subject: assignment.subject_id.clone(),
            });
        }
    }

    observations
        .iter()
        .map(|obs| {
            let cluster_id = lookup.get(obs.subject_id.as_str()).copied().ok_or_else(|| {
                TrajectoryError::MissingAssignment {
                    subject: obs.subject_id.clone(),
                }
            })?;
            Ok(AnnotatedObservation {
                subject_id: obs.subject_id.clone(),
                time: obs.time,
                value: obs.value,
                cluster_id,
            })
        })
        .collect()
}

/// Run every stage on `observations` with `config`
///
/// Observations of subjects skipped by the sparse-subject policy are left
/// out of the annotated set.
pub fn run_pipeline(
    observations: &[Observation],
    config: &PipelineConfig,
) -> Result<PipelineOutput, TrajectoryError> {
    let fits = fit_subjects(observations, config.sparse_policy)?;
    let features = assemble_features(&fits)?;
    debug!(rows = features.len(), "feature table assembled");

    let model = fit_clusters(&features, &config.cluster)?;
    let assignments = model.assignments();

    let fitted: HashSet<&str> = fits.iter().map(|f| f.subject_id.as_str()).collect();
    let kept: Vec<Observation> = observations
        .iter()
        .filter(|obs| fitted.contains(obs.subject_id.as_str()))
        .cloned()
        .collect();
    let annotated = annotate(&kept, &assignments)?;

    info!(
        subjects = fits.len(),
        observations = annotated.len(),
        clusters = model.n_clusters,
        "pipeline complete"
    );

    Ok(PipelineOutput {
        fits,
        features,
        model,
        assignments,
        annotated,
    })
}
