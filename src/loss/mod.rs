pub mod center;
pub mod centroids;
pub mod dispersion;

pub use center::{CenterLoss, CenterLossOutput, DEFAULT_ALPHA};
pub use centroids::CentroidTable;
pub use dispersion::{DispersionOutcome, DispersionReport};
