pub mod error;
pub mod math;
pub mod config;
pub mod loss;
pub mod viz;
pub mod optim;
pub mod train;

// Convenience re-exports
pub use error::{CenterLossError, Result};
pub use math::matrix::Matrix;
pub use config::{CenterLossConfig, DispersionConfig, RunConfig, TrainSettings};
pub use loss::center::{CenterLoss, CenterLossOutput};
pub use loss::dispersion::{DispersionOutcome, DispersionReport};
pub use viz::heatmap::{CentroidVisualizer, HeatmapVisualizer, NoopVisualizer};
pub use optim::sgd::Sgd;
pub use train::{train_loop, TrainConfig, EpochStats};
