//! Cluster size chart using Plotters

use std::path::Path;

use plotters::prelude::*;
use tracing::info;

use crate::error::SegmentError;

/// Color palette for different clusters
const CLUSTER_COLORS: [RGBColor; 5] = [RED, BLUE, GREEN, YELLOW, MAGENTA];

fn render_error(e: impl std::fmt::Display) -> SegmentError {
    SegmentError::Render(e.to_string())
}

/// Draw one bar per cluster, height proportional to its member count.
///
/// The chart carries no text so it renders without system fonts.
pub fn create_cluster_size_chart(cluster_sizes: &[usize], output_path: &Path) -> crate::Result<()> {
    let n_clusters = cluster_sizes.len().max(1);
    let max_size = cluster_sizes.iter().copied().max().unwrap_or(1).max(1) as f64;

    let root = BitMapBackend::new(output_path, (600, 400)).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .build_cartesian_2d(-0.5f64..(n_clusters as f64 - 0.5), 0f64..(max_size * 1.1))
        .map_err(render_error)?;

    for (cluster_id, &size) in cluster_sizes.iter().enumerate() {
        let color = CLUSTER_COLORS
            .get(cluster_id % CLUSTER_COLORS.len())
            .copied()
            .unwrap_or(BLUE);

        chart
            .draw_series(std::iter::once(Rectangle::new(
                [
                    (cluster_id as f64 - 0.4, 0.0),
                    (cluster_id as f64 + 0.4, size as f64),
                ],
                color.filled(),
            )))
            .map_err(render_error)?;
    }

    root.present().map_err(render_error)?;
    info!(path = %output_path.display(), "cluster size chart saved");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_cluster_size_chart() {
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("sizes.png");

        create_cluster_size_chart(&[120, 80, 0, 45], &output_path).unwrap();
        assert!(output_path.exists());
    }

    #[test]
    fn test_empty_sizes_still_render() {
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("empty.png");

        create_cluster_size_chart(&[], &output_path).unwrap();
        assert!(output_path.exists());
    }
}
