pub mod heatmap;

pub use heatmap::{CentroidVisualizer, HeatmapVisualizer, NoopVisualizer, write_report};
