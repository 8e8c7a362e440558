//! Visualization functions using Plotters for trajectory clusters

use crate::model::ClusterModel;
use crate::pipeline::AnnotatedObservation;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::info;

/// Explicit styling for every chart; nothing is read from global state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotTheme {
    pub width: u32,
    pub height: u32,
    pub font_family: String,
    pub caption_size: u32,
    pub label_size: u32,
    pub background: [u8; 3],
    /// Cluster colours, cycled when there are more clusters than entries
    pub palette: Vec<[u8; 3]>,
    pub line_width: u32,
    pub point_size: u32,
}

impl Default for PlotTheme {
    fn default() -> Self {
        Self {
            width: 900,
            height: 600,
            font_family: "sans-serif".to_string(),
            caption_size: 28,
            label_size: 15,
            background: [255, 255, 255],
            palette: vec![
                [228, 26, 28],
                [55, 126, 184],
                [77, 175, 74],
                [152, 78, 163],
                [255, 127, 0],
                [166, 86, 40],
            ],
            line_width: 2,
            point_size: 3,
        }
    }
}

impl PlotTheme {
    pub fn validate(&self) -> crate::Result<()> {
        if self.width == 0 || self.height == 0 {
            anyhow::bail!("plot size must be non-zero, got {}x{}", self.width, self.height);
        }
        if self.palette.is_empty() {
            anyhow::bail!("plot palette must contain at least one colour");
        }
        Ok(())
    }

    /// Colour for a 1-based cluster id
    pub fn color_for(&self, cluster_id: usize) -> RGBColor {
        if self.palette.is_empty() {
            return BLACK;
        }
        let [r, g, b] = self.palette[cluster_id.saturating_sub(1) % self.palette.len()];
        RGBColor(r, g, b)
    }

    fn background_color(&self) -> RGBColor {
        let [r, g, b] = self.background;
        RGBColor(r, g, b)
    }

    fn caption_style(&self) -> (&str, f64) {
        (self.font_family.as_str(), self.caption_size as f64)
    }

    fn label_style(&self) -> (&str, f64) {
        (self.font_family.as_str(), self.label_size as f64)
    }
}

/// One subject's time-ordered series and its cluster
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSeries {
    pub subject_id: String,
    pub cluster_id: usize,
    pub points: Vec<(f64, f64)>,
}

/// Drawable layout of annotated trajectories
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryChart {
    pub series: Vec<SubjectSeries>,
    pub x_range: Range<f64>,
    pub y_range: Range<f64>,
}

impl TrajectoryChart {
    /// Group annotated observations into per-subject series sorted by time
    pub fn build(annotated: &[AnnotatedObservation]) -> Self {
        let mut by_subject: BTreeMap<&str, SubjectSeries> = BTreeMap::new();
        for obs in annotated {
            by_subject
                .entry(obs.subject_id.as_str())
                .or_insert_with(|| SubjectSeries {
                    subject_id: obs.subject_id.clone(),
                    cluster_id: obs.cluster_id,
                    points: Vec::new(),
                })
                .points
                .push((obs.time, obs.value));
        }

        let mut series: Vec<SubjectSeries> = by_subject.into_values().collect();
        for s in &mut series {
            s.points.sort_by(|a, b| a.0.total_cmp(&b.0));
        }

        let x_range = padded_range(annotated.iter().map(|o| o.time));
        let y_range = padded_range(annotated.iter().map(|o| o.value));

        Self {
            series,
            x_range,
            y_range,
        }
    }

    /// Distinct cluster ids present, ascending
    pub fn cluster_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.series.iter().map(|s| s.cluster_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Min..max of `values` widened by 5% on each side (0.5 for a flat span)
fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    let span = max - min;
    let pad = if span > 0.0 { span * 0.05 } else { 0.5 };
    (min - pad)..(max + pad)
}

/// Derive a sibling output path, e.g. `plot.png` + `_sizes` -> `plot_sizes.png`
pub fn sibling_path(base: &Path, suffix: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plot".to_string());
    let extension = base
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    base.with_file_name(format!("{}{}.{}", stem, suffix, extension))
}

/// Draw time vs value, one line per subject, coloured by cluster
pub fn render_trajectories(
    chart: &TrajectoryChart,
    theme: &PlotTheme,
    output_path: &Path,
) -> crate::Result<()> {
    let root = BitMapBackend::new(output_path, (theme.width, theme.height)).into_drawing_area();
    root.fill(&theme.background_color())?;

    let mut ctx = ChartBuilder::on(&root)
        .caption("Subject trajectories by cluster", theme.caption_style())
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(chart.x_range.clone(), chart.y_range.clone())?;

    ctx.configure_mesh()
        .x_desc("Time")
        .y_desc("Value")
        .axis_desc_style(theme.label_style())
        .draw()?;

    let mut labelled = HashSet::new();
    for series in &chart.series {
        let color = theme.color_for(series.cluster_id);
        let anno = ctx.draw_series(LineSeries::new(
            series.points.iter().copied(),
            color.stroke_width(theme.line_width),
        ))?;
        if labelled.insert(series.cluster_id) {
            anno.label(format!("Cluster {}", series.cluster_id))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }

        ctx.draw_series(
            series
                .points
                .iter()
                .map(|&p| Circle::new(p, theme.point_size, color.filled())),
        )?;
    }

    ctx.configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    info!(path = %output_path.display(), "trajectory chart saved");

    Ok(())
}

/// Scatter of subjects in (intercept, slope) space with centroids
pub fn render_feature_space(
    model: &ClusterModel,
    theme: &PlotTheme,
    output_path: &Path,
) -> crate::Result<()> {
    let raw = model.scaler.inverse_transform(&model.points);
    let centroids = model.centroids_in_feature_space();

    let x_range = padded_range(raw.column(0).iter().chain(centroids.column(0).iter()).copied());
    let y_range = padded_range(raw.column(1).iter().chain(centroids.column(1).iter()).copied());

    let root = BitMapBackend::new(output_path, (theme.width, theme.height)).into_drawing_area();
    root.fill(&theme.background_color())?;

    let mut ctx = ChartBuilder::on(&root)
        .caption("Per-subject trends: intercept vs slope", theme.caption_style())
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)?;

    ctx.configure_mesh()
        .x_desc("Intercept")
        .y_desc("Slope")
        .axis_desc_style(theme.label_style())
        .draw()?;

    for (point, &label) in raw.outer_iter().zip(model.labels.iter()) {
        let color = theme.color_for(label + 1);
        ctx.draw_series(std::iter::once(Circle::new(
            (point[0], point[1]),
            theme.point_size + 2,
            color.filled(),
        )))?;
    }

    for (idx, centroid) in centroids.outer_iter().enumerate() {
        let cluster_id = idx + 1;
        let color = theme.color_for(cluster_id);
        ctx.draw_series(std::iter::once(Cross::new(
            (centroid[0], centroid[1]),
            8,
            color.stroke_width(3),
        )))?
        .label(format!("Cluster {} centroid", cluster_id))
        .legend(move |(x, y)| Cross::new((x + 5, y), 5, color.stroke_width(2)));
    }

    ctx.configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    info!(path = %output_path.display(), "feature space chart saved");

    Ok(())
}

/// Create a simple bar chart of cluster sizes
pub fn render_cluster_sizes(
    model: &ClusterModel,
    theme: &PlotTheme,
    output_path: &Path,
) -> crate::Result<()> {
    let cluster_sizes = model.cluster_sizes();
    let max_size = cluster_sizes.iter().copied().max().unwrap_or(1).max(1) as f64;

    let root = BitMapBackend::new(output_path, (theme.width * 2 / 3, theme.height * 2 / 3))
        .into_drawing_area();
    root.fill(&theme.background_color())?;

    let mut ctx = ChartBuilder::on(&root)
        .caption("Cluster sizes", theme.caption_style())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.5f64..(model.n_clusters as f64 + 0.5), 0f64..(max_size * 1.1))?;

    ctx.configure_mesh()
        .x_desc("Cluster")
        .y_desc("Number of subjects")
        .x_labels(model.n_clusters)
        .x_label_formatter(&|x| format!("{:.0}", x))
        .axis_desc_style(theme.label_style())
        .draw()?;

    for (idx, &size) in cluster_sizes.iter().enumerate() {
        let cluster_id = idx + 1;
        let x = cluster_id as f64;
        ctx.draw_series(std::iter::once(Rectangle::new(
            [(x - 0.4, 0.0), (x + 0.4, size as f64)],
            theme.color_for(cluster_id).filled(),
        )))?;
    }

    root.present()?;
    info!(path = %output_path.display(), "cluster size chart saved");

    Ok(())
}

/// Print cluster statistics to console
pub fn print_cluster_report(model: &ClusterModel) {
    let n_subjects = model.subject_ids.len();

    println!("\n=== Cluster Statistics ===");
    println!("Number of clusters: {}", model.n_clusters);
    println!("Total subjects: {}", n_subjects);
    println!("Within-cluster sum of squares (Inertia): {:.4}", model.inertia);
    println!("Silhouette score: {:.3}", model.silhouette_score(n_subjects));

    println!("\nCluster sizes:");
    for (idx, &size) in model.cluster_sizes().iter().enumerate() {
        let percentage = if n_subjects > 0 {
            size as f64 / n_subjects as f64 * 100.0
        } else {
            0.0
        };
        println!("  Cluster {}: {} subjects ({:.1}%)", idx + 1, size, percentage);
    }

    println!("\nCluster centroids:");
    println!("  Cluster | Intercept |    Slope");
    println!("  --------|-----------|---------");
    for (idx, centroid) in model.centroids_in_feature_space().outer_iter().enumerate() {
        println!("  {:7} | {:9.3} | {:8.3}", idx + 1, centroid[0], centroid[1]);
    }
}

/// Render all charts next to `base_output_path` and print the report
///
/// Writes `<base>`, `<stem>_features.<ext>` and `<stem>_sizes.<ext>`.
pub fn generate_visualization_report(
    annotated: &[AnnotatedObservation],
    model: &ClusterModel,
    theme: &PlotTheme,
    base_output_path: &Path,
) -> crate::Result<Vec<PathBuf>> {
    let chart = TrajectoryChart::build(annotated);
    let features_path = sibling_path(base_output_path, "_features");
    let sizes_path = sibling_path(base_output_path, "_sizes");

    render_trajectories(&chart, theme, base_output_path)?;
    render_feature_space(model, theme, &features_path)?;
    render_cluster_sizes(model, theme, &sizes_path)?;

    print_cluster_report(model);

    Ok(vec![base_output_path.to_path_buf(), features_path, sizes_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::assemble_features;
    use crate::model::{fit_clusters, ClusterConfig};
    use crate::regression::PerSubjectFit;
    use tempfile::tempdir;

    fn annotated(subject: &str, cluster_id: usize, time: f64, value: f64) -> AnnotatedObservation {
        AnnotatedObservation {
            subject_id: subject.to_string(),
            time,
            value,
            cluster_id,
        }
    }

    fn create_test_data() -> (Vec<AnnotatedObservation>, ClusterModel) {
        let fits: Vec<PerSubjectFit> = [("a", 1.0, 2.0), ("b", 1.1, 2.1), ("c", 9.0, -2.0), ("d", 9.5, -1.8)]
            .iter()
            .map(|&(id, intercept, slope)| PerSubjectFit {
                subject_id: id.to_string(),
                intercept,
                slope,
                n_observations: 2,
            })
            .collect();
        let table = assemble_features(&fits).unwrap();
        let config = ClusterConfig {
            seed: Some(3),
            ..ClusterConfig::default()
        };
        let model = fit_clusters(&table, &config).unwrap();

        let observations = model
            .assignments()
            .iter()
            .zip(&fits)
            .flat_map(|(a, f)| {
                [0.0, 1.0, 2.0]
                    .into_iter()
                    .map(move |t| annotated(&a.subject_id, a.cluster_id, t, f.predict(t)))
            })
            .collect();

        (observations, model)
    }

    #[test]
    fn test_chart_groups_and_sorts_series() {
        let data = vec![
            annotated("s2", 2, 1.0, 5.0),
            annotated("s1", 1, 2.0, 3.0),
            annotated("s1", 1, 0.0, 1.0),
            annotated("s2", 2, 0.0, 7.0),
        ];

        let chart = TrajectoryChart::build(&data);

        assert_eq!(chart.series.len(), 2);
        assert_eq!(chart.series[0].subject_id, "s1");
        assert_eq!(chart.series[0].points, vec![(0.0, 1.0), (2.0, 3.0)]);
        assert_eq!(chart.series[1].cluster_id, 2);
        assert_eq!(chart.cluster_ids(), vec![1, 2]);
        assert!(chart.x_range.start < 0.0 && chart.x_range.end > 2.0);
        assert!(chart.y_range.start < 1.0 && chart.y_range.end > 7.0);
    }

    #[test]
    fn test_padded_range_flat_and_empty() {
        assert_eq!(padded_range([3.0, 3.0].into_iter()), 2.5..3.5);
        assert_eq!(padded_range(std::iter::empty()), 0.0..1.0);
    }

    #[test]
    fn test_theme_colour_cycles() {
        let theme = PlotTheme {
            palette: vec![[1, 2, 3], [4, 5, 6]],
            ..PlotTheme::default()
        };

        assert_eq!(theme.color_for(1), RGBColor(1, 2, 3));
        assert_eq!(theme.color_for(2), RGBColor(4, 5, 6));
        assert_eq!(theme.color_for(3), RGBColor(1, 2, 3));
    }

    #[test]
    fn test_theme_validate() {
        assert!(PlotTheme::default().validate().is_ok());
        let empty = PlotTheme {
            palette: Vec::new(),
            ..PlotTheme::default()
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_sibling_path() {
        let base = Path::new("/tmp/out/trajectories.png");
        assert_eq!(
            sibling_path(base, "_sizes"),
            PathBuf::from("/tmp/out/trajectories_sizes.png")
        );
        assert_eq!(
            sibling_path(Path::new("plot"), "_features"),
            PathBuf::from("plot_features.png")
        );
    }

    #[test]
    #[ignore = "needs system fonts for text rendering"]
    fn test_generate_visualization_report() {
        let (observations, model) = create_test_data();
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("report.png");

        let written = generate_visualization_report(
            &observations,
            &model,
            &PlotTheme::default(),
            &output_path,
        )
        .unwrap();

        assert_eq!(written.len(), 3);
        for path in written {
            assert!(path.exists());
        }
    }
}
