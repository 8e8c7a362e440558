//! trajforge: trajectory clustering CLI
//!
//! This is the main entrypoint that orchestrates data loading, per-subject
//! regression, clustering, visualization, and prediction.

use anyhow::Result;
use clap::Parser;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use trajforge::{load_observations, run_pipeline, viz, Args};

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = args.resolve_config()?;
    let predict_values = args.parse_predict_values()?;

    println!("=== Trajectory Clustering Pipeline ===\n");
    let start_time = Instant::now();

    // Step 1: Load observations
    info!(path = %args.input.display(), "loading observations");
    let data_start = Instant::now();
    let observations = load_observations(&args.input, &config.columns)?;
    debug!(elapsed_s = data_start.elapsed().as_secs_f64(), "data loaded");
    println!("✓ Data loaded: {} observations", observations.len());

    // Step 2: Fit trends and cluster
    debug!(
        clusters = config.cluster.n_clusters,
        max_iters = config.cluster.max_iters,
        tolerance = config.cluster.tolerance,
        seed = ?config.cluster.seed,
        standardize = config.cluster.standardize,
        "fitting model"
    );
    let model_start = Instant::now();
    let output = run_pipeline(&observations, &config)?;
    debug!(elapsed_s = model_start.elapsed().as_secs_f64(), "model fitted");
    println!(
        "✓ Model fitted: {} subjects in {} clusters",
        output.fits.len(),
        output.model.n_clusters
    );

    println!("\n=== Subject Assignments ===");
    println!("  Subject          | Intercept |    Slope | Cluster");
    for (fit, assignment) in output.fits.iter().zip(&output.assignments) {
        println!(
            "  {:16} | {:9.3} | {:8.3} | {:7}",
            fit.subject_id, fit.intercept, fit.slope, assignment.cluster_id
        );
    }

    // Step 3: Visualizations and report
    let viz_start = Instant::now();
    let written = viz::generate_visualization_report(
        &output.annotated,
        &output.model,
        &config.theme,
        &args.output,
    )?;
    debug!(elapsed_s = viz_start.elapsed().as_secs_f64(), "visualizations generated");

    if let Some((intercept, slope)) = predict_values {
        let cluster = output.model.predict(intercept, slope)?;
        println!("\n=== Prediction ===");
        println!("Input trend: intercept={}, slope={}", intercept, slope);
        println!("✓ Predicted Cluster: {}", cluster);
    }

    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    for path in written {
        println!("Chart saved to: {}", path.display());
    }

    Ok(())
}
