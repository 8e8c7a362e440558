//! Integration tests for trajforge

use approx::assert_relative_eq;
use std::collections::HashSet;
use std::io::Write;
use tempfile::NamedTempFile;
use trajforge::{
    assemble_features, fit_clusters, fit_subjects, load_observations, run_pipeline, ClusterConfig,
    ColumnNames, PipelineConfig, SparseSubjectPolicy, TrajectoryError,
};

/// Create a test CSV file with two clearly different trajectory shapes
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "subject,time,value").unwrap();

    // Rising subjects: low start, slope around +2
    for (subject, start, slope) in [("r1", 1.0, 2.0), ("r2", 1.5, 2.2), ("r3", 0.8, 1.9)] {
        for t in 0..4 {
            writeln!(file, "{},{},{}", subject, t, start + slope * t as f64).unwrap();
        }
    }

    // Falling subjects: high start, slope around -2
    for (subject, start, slope) in [("f1", 10.0, -2.0), ("f2", 9.5, -1.8), ("f3", 10.4, -2.1)] {
        for t in 0..4 {
            writeln!(file, "{},{},{}", subject, t, start + slope * t as f64).unwrap();
        }
    }

    file
}

fn seeded_config(k: usize) -> PipelineConfig {
    PipelineConfig {
        cluster: ClusterConfig {
            n_clusters: k,
            seed: Some(2024),
            ..ClusterConfig::default()
        },
        ..PipelineConfig::default()
    }
}

#[test]
fn test_end_to_end_pipeline() {
    let test_file = create_test_csv();
    let observations = load_observations(test_file.path(), &ColumnNames::default()).unwrap();
    assert_eq!(observations.len(), 24);

    let output = run_pipeline(&observations, &seeded_config(2)).unwrap();

    assert_eq!(output.fits.len(), 6);
    assert_eq!(output.features.len(), 6);
    assert_eq!(output.annotated.len(), observations.len());

    // Every subject exactly once, cluster ids in 1..=k
    let subjects: HashSet<&str> = output.assignments.iter().map(|a| a.subject_id.as_str()).collect();
    assert_eq!(subjects.len(), 6);
    assert!(output.assignments.iter().all(|a| (1..=2).contains(&a.cluster_id)));

    let cluster_of = |id: &str| {
        output
            .assignments
            .iter()
            .find(|a| a.subject_id == id)
            .map(|a| a.cluster_id)
            .unwrap()
    };
    assert_eq!(cluster_of("r1"), cluster_of("r2"));
    assert_eq!(cluster_of("r1"), cluster_of("r3"));
    assert_eq!(cluster_of("f1"), cluster_of("f2"));
    assert_eq!(cluster_of("f1"), cluster_of("f3"));
    assert_ne!(cluster_of("r1"), cluster_of("f1"));

    // Annotated rows carry their subject's cluster
    for obs in &output.annotated {
        assert_eq!(obs.cluster_id, cluster_of(&obs.subject_id));
    }
}

#[test]
fn test_two_subject_scenario() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "subject,time,value\nA,0,1\nA,1,3\nB,0,10\nB,1,8").unwrap();

    let observations = load_observations(file.path(), &ColumnNames::default()).unwrap();
    let fits = fit_subjects(&observations, SparseSubjectPolicy::Fail).unwrap();

    assert_eq!(fits[0].subject_id, "A");
    assert_relative_eq!(fits[0].intercept, 1.0, epsilon = 1e-12);
    assert_relative_eq!(fits[0].slope, 2.0, epsilon = 1e-12);
    assert_eq!(fits[1].subject_id, "B");
    assert_relative_eq!(fits[1].intercept, 10.0, epsilon = 1e-12);
    assert_relative_eq!(fits[1].slope, -2.0, epsilon = 1e-12);
}

#[test]
fn test_single_cluster_assigns_all_to_one() {
    let test_file = create_test_csv();
    let observations = load_observations(test_file.path(), &ColumnNames::default()).unwrap();

    let output = run_pipeline(&observations, &seeded_config(1)).unwrap();

    assert!(output.assignments.iter().all(|a| a.cluster_id == 1));
    assert!(output.annotated.iter().all(|o| o.cluster_id == 1));
}

#[test]
fn test_error_handling_too_many_clusters() {
    let test_file = create_test_csv();
    let observations = load_observations(test_file.path(), &ColumnNames::default()).unwrap();

    let err = run_pipeline(&observations, &seeded_config(7)).unwrap_err();
    assert!(matches!(
        err,
        TrajectoryError::Clustering { requested: 7, subjects: 6, .. }
    ));
}

#[test]
fn test_sparse_subject_fails_by_default() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "subject,time,value\nA,0,1\nA,1,3\nB,0,10").unwrap();
    let observations = load_observations(file.path(), &ColumnNames::default()).unwrap();

    let err = run_pipeline(&observations, &seeded_config(1)).unwrap_err();
    assert!(matches!(err, TrajectoryError::InsufficientData { ref subject, .. } if subject == "B"));
}

#[test]
fn test_estimator_and_assembler_are_idempotent() {
    let test_file = create_test_csv();
    let observations = load_observations(test_file.path(), &ColumnNames::default()).unwrap();

    let first = assemble_features(&fit_subjects(&observations, SparseSubjectPolicy::Fail).unwrap()).unwrap();
    let second = assemble_features(&fit_subjects(&observations, SparseSubjectPolicy::Fail).unwrap()).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_model_inertia_and_seed() {
    let test_file = create_test_csv();
    let observations = load_observations(test_file.path(), &ColumnNames::default()).unwrap();
    let features = assemble_features(&fit_subjects(&observations, SparseSubjectPolicy::Fail).unwrap()).unwrap();
    let config = seeded_config(3).cluster;

    let first = fit_clusters(&features, &config).unwrap();
    let second = fit_clusters(&features, &config).unwrap();

    assert!(first.inertia >= 0.0);
    assert!(first.inertia.is_finite());
    assert_eq!(first.assignments(), second.assignments());
    assert_eq!(first.cluster_sizes().iter().sum::<usize>(), 6);
}
