use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::error::{CenterLossError, Result};
use crate::math::matrix::Matrix;

/// Per-class centroid table, shape `(num_classes, feat_dim)`.
///
/// This is the only non-differentiable state of `CenterLoss`. Features never
/// flow gradients into it: reads go through `view()` and every write happens
/// inside `update_no_grad()`, which is where the moving-average and
/// dispersion updates are applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CentroidTable {
    centers: Matrix,
}

impl CentroidTable {
    /// Standard-normal rows, each normalised to unit length.
    pub fn random<R: Rng + ?Sized>(num_classes: usize, feat_dim: usize, rng: &mut R) -> Self {
        CentroidTable {
            centers: Matrix::standard_normal(num_classes, feat_dim, rng).normalize_rows(),
        }
    }

    pub fn from_matrix(centers: Matrix) -> Self {
        CentroidTable { centers }
    }

    pub fn view(&self) -> &Matrix {
        &self.centers
    }

    pub fn num_classes(&self) -> usize {
        self.centers.rows
    }

    pub fn feat_dim(&self) -> usize {
        self.centers.cols
    }

    /// Mutates the table in place, outside of any gradient computation.
    pub fn update_no_grad<F, T>(&mut self, update: F) -> T
    where
        F: FnOnce(&mut Matrix) -> T,
    {
        update(&mut self.centers)
    }

    /// Replaces the whole table; used after a dispersion round.
    /// The replacement must keep the table's shape.
    pub fn replace_no_grad(&mut self, centers: Matrix) -> Result<()> {
        if centers.rows != self.centers.rows {
            return Err(CenterLossError::ShapeMismatch {
                what: "centroid rows",
                expected: self.centers.rows,
                got: centers.rows,
            });
        }
        if centers.cols != self.centers.cols {
            return Err(CenterLossError::ShapeMismatch {
                what: "centroid cols",
                expected: self.centers.cols,
                got: centers.cols,
            });
        }
        self.centers = centers;
        Ok(())
    }
}
