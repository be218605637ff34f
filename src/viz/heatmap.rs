//! Debug renderings of a centroid table.
//!
//! A table is drawn as a grayscale heatmap: one pixel row per centroid, one
//! pixel column per feature, with the table's minimum mapped to black and its
//! maximum to white.

use std::fs;
use std::io::Write;
use std::path::Path;

use image::{GrayImage, Luma};
use log::debug;

use crate::error::{CenterLossError, Result};
use crate::math::matrix::Matrix;

/// File name of the heatmap written into each output directory.
pub const HEATMAP_FILE: &str = "centers.png";

/// File name of the min/max report written next to an update heatmap.
pub const REPORT_FILE: &str = "report.txt";

/// Debug output sink for dispersion rounds.
pub trait CentroidVisualizer {
    /// Renders a centroid table (or an update to one) into `outdir`.
    fn render(&mut self, table: &Matrix, outdir: &Path) -> Result<()>;

    /// Records the min/max of an update table into `outdir`.
    fn report(&mut self, table: &Matrix, outdir: &Path) -> Result<()>;
}

/// Writes `centers.png` and `report.txt` into the output directory,
/// creating it first.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeatmapVisualizer;

impl CentroidVisualizer for HeatmapVisualizer {
    fn render(&mut self, table: &Matrix, outdir: &Path) -> Result<()> {
        fs::create_dir_all(outdir)?;
        let path = outdir.join(HEATMAP_FILE);
        heatmap(table)?.save(&path)?;
        debug!("wrote {}", path.display());
        Ok(())
    }

    fn report(&mut self, table: &Matrix, outdir: &Path) -> Result<()> {
        write_report(outdir, table)
    }
}

/// Writes nothing to disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopVisualizer;

impl CentroidVisualizer for NoopVisualizer {
    fn render(&mut self, _table: &Matrix, _outdir: &Path) -> Result<()> {
        Ok(())
    }

    fn report(&mut self, _table: &Matrix, _outdir: &Path) -> Result<()> {
        Ok(())
    }
}

/// Min-max scaled grayscale image of `table`. A constant table renders mid-gray.
pub fn heatmap(table: &Matrix) -> Result<GrayImage> {
    if table.is_empty() {
        return Err(CenterLossError::InvalidInput("cannot render an empty table".into()));
    }
    let (lo, hi) = match (table.min(), table.max()) {
        (Some(lo), Some(hi)) => (lo, hi),
        _ => return Err(CenterLossError::InvalidInput("cannot render an empty table".into())),
    };
    let span = hi - lo;

    let width = u32::try_from(table.cols)
        .map_err(|_| CenterLossError::InvalidInput("table too wide to render".into()))?;
    let height = u32::try_from(table.rows)
        .map_err(|_| CenterLossError::InvalidInput("table too tall to render".into()))?;

    Ok(GrayImage::from_fn(width, height, |x, y| {
        let v = table.data[y as usize][x as usize];
        let t = if span > 0.0 && span.is_finite() { (v - lo) / span } else { 0.5 };
        Luma([(t.clamp(0.0, 1.0) * 255.0).round() as u8])
    }))
}

/// Writes `report.txt` with `max: <v> - min: <v>` into `outdir`.
pub fn write_report(outdir: &Path, table: &Matrix) -> Result<()> {
    let (Some(max), Some(min)) = (table.max(), table.min()) else {
        return Err(CenterLossError::InvalidInput("cannot report on an empty table".into()));
    };
    fs::create_dir_all(outdir)?;
    let mut file = fs::File::create(outdir.join(REPORT_FILE))?;
    write!(file, "max: {max} - min: {min}")?;
    Ok(())
}
