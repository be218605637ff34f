use std::path::Path;

use log::debug;
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::error::{CenterLossError, Result};
use crate::loss::centroids::CentroidTable;
use crate::math::matrix::Matrix;

/// Default step size of the centroid moving average.
pub const DEFAULT_ALPHA: f64 = 0.01;

/// Center loss (Wen et al., "A Discriminative Feature Learning Approach for
/// Deep Face Recognition", ECCV 2016).
///
/// Holds one centroid per class. Every `forward` pulls the centroids of the
/// labels in the batch towards the batch features,
/// `center += alpha * (feature - center)`, and returns the squared distance
/// of the features to the centroids they were compared against.
///
/// Only `alpha` and the centroid table are persisted; the dispersion
/// counters start at zero after a load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CenterLoss {
    alpha: f64,
    centers: CentroidTable,
    #[serde(skip)]
    pub(crate) counter: usize,
    #[serde(skip)]
    pub(crate) nupdate: usize,
}

/// Result of one `CenterLoss::forward` call.
#[derive(Debug, Clone, PartialEq)]
pub struct CenterLossOutput {
    /// `sum((features - centers[labels])²)` over every element.
    pub loss: f64,
    /// `features - centers[labels]`, using the centroids from before the update.
    pub diff: Matrix,
}

impl CenterLossOutput {
    /// Gradient of `loss` w.r.t. the input features: `2 * diff`.
    ///
    /// The gathered centroids are a snapshot, so nothing flows into them.
    pub fn grad(&self) -> Matrix {
        self.diff.scale(2.0)
    }
}

impl CenterLoss {
    /// Random unit-norm centroids drawn from the thread RNG.
    pub fn new(num_classes: usize, feat_dim: usize, alpha: f64) -> Result<CenterLoss> {
        CenterLoss::with_rng(num_classes, feat_dim, alpha, &mut rand::thread_rng())
    }

    /// Random unit-norm centroids drawn from `rng`.
    pub fn with_rng<R: Rng + ?Sized>(
        num_classes: usize,
        feat_dim: usize,
        alpha: f64,
        rng: &mut R,
    ) -> Result<CenterLoss> {
        if num_classes == 0 {
            return Err(CenterLossError::InvalidInput("num_classes must be at least 1".into()));
        }
        if feat_dim == 0 {
            return Err(CenterLossError::InvalidInput("feat_dim must be at least 1".into()));
        }
        CenterLoss::from_centers(CentroidTable::random(num_classes, feat_dim, rng).view().clone(), alpha)
    }

    /// Uses `centers` as-is; rows are not renormalised.
    pub fn from_centers(centers: Matrix, alpha: f64) -> Result<CenterLoss> {
        if !alpha.is_finite() {
            return Err(CenterLossError::InvalidInput(format!("alpha must be finite, got {alpha}")));
        }
        if centers.is_empty() {
            return Err(CenterLossError::InvalidInput("centroid table must not be empty".into()));
        }
        Ok(CenterLoss {
            alpha,
            centers: CentroidTable::from_matrix(centers),
            counter: 0,
            nupdate: 0,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn centers(&self) -> &Matrix {
        self.centers.view()
    }

    pub fn num_classes(&self) -> usize {
        self.centers.num_classes()
    }

    pub fn feat_dim(&self) -> usize {
        self.centers.feat_dim()
    }

    /// Dispersion calls swallowed by the warm-up guard since the last full run.
    pub fn counter(&self) -> usize {
        self.counter
    }

    /// Total dispersion rounds applied so far.
    pub fn nupdate(&self) -> usize {
        self.nupdate
    }

    pub(crate) fn table_mut(&mut self) -> &mut CentroidTable {
        &mut self.centers
    }

    /// Computes the loss and moves the centroids of `labels` towards
    /// `features` (scatter-add, so repeated labels accumulate).
    ///
    /// `features` is `batch × feat_dim`, `labels` has one class index per row.
    /// On error the centroid table is left untouched.
    pub fn forward(&mut self, features: &Matrix, labels: &[usize]) -> Result<CenterLossOutput> {
        self.check_batch(features, labels)?;
        if labels.is_empty() {
            return Ok(CenterLossOutput { loss: 0.0, diff: Matrix::zeros(0, self.feat_dim()) });
        }

        let batch_centers = self.centers.view().index_select(labels);
        let diff = features - &batch_centers;

        let alpha = self.alpha;
        self.centers.update_no_grad(|centers| centers.index_add(labels, &diff, alpha));

        let loss = diff.sum_squares();
        debug!("center loss over {} samples: {loss}", labels.len());
        Ok(CenterLossOutput { loss, diff })
    }

    /// Evaluates the loss without touching the centroids.
    pub fn loss(&self, features: &Matrix, labels: &[usize]) -> Result<f64> {
        self.check_batch(features, labels)?;
        if labels.is_empty() {
            return Ok(0.0);
        }
        Ok((features - &self.centers.view().index_select(labels)).sum_squares())
    }

    fn check_batch(&self, features: &Matrix, labels: &[usize]) -> Result<()> {
        if features.rows != labels.len() {
            return Err(CenterLossError::ShapeMismatch {
                what: "batch",
                expected: labels.len(),
                got: features.rows,
            });
        }
        if features.rows > 0 && features.cols != self.feat_dim() {
            return Err(CenterLossError::ShapeMismatch {
                what: "feature dim",
                expected: self.feat_dim(),
                got: features.cols,
            });
        }
        let num_classes = self.num_classes();
        if let Some(&label) = labels.iter().find(|&&l| l >= num_classes) {
            return Err(CenterLossError::LabelOutOfRange { label, num_classes });
        }
        Ok(())
    }

    /// Serializes `alpha` and the centroid table to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Restores a module previously written by `save_json`.
    pub fn load_json(path: impl AsRef<Path>) -> Result<CenterLoss> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let loaded: CenterLoss = serde_json::from_reader(reader)?;
        let declared = loaded.centers.view();
        let checked = Matrix::from_data(declared.data.clone())?;
        if checked.rows != declared.rows {
            return Err(CenterLossError::ShapeMismatch {
                what: "checkpoint rows",
                expected: declared.rows,
                got: checked.rows,
            });
        }
        if checked.cols != declared.cols {
            return Err(CenterLossError::ShapeMismatch {
                what: "checkpoint cols",
                expected: declared.cols,
                got: checked.cols,
            });
        }
        CenterLoss::from_centers(checked, loaded.alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn m(data: Vec<Vec<f64>>) -> Matrix {
        Matrix::from_data(data).unwrap()
    }

    fn three_class_loss(alpha: f64) -> CenterLoss {
        CenterLoss::from_centers(m(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.0, 0.0]]), alpha)
            .unwrap()
    }

    #[test]
    fn worked_example() {
        let mut cl = three_class_loss(0.1);
        let out = cl.forward(&m(vec![vec![2.0, 0.0]]), &[0]).unwrap();
        assert_eq!(out.diff.data, vec![vec![1.0, 0.0]]);
        assert!((out.loss - 1.0).abs() < 1e-12);
        assert!((cl.centers().data[0][0] - 1.1).abs() < 1e-12);
        assert_eq!(cl.centers().data[0][1], 0.0);
        assert_eq!(cl.centers().data[1], vec![0.0, 1.0]);
        assert_eq!(cl.centers().data[2], vec![0.0, 0.0]);
    }

    #[test]
    fn unique_labels_move_by_alpha_times_diff() {
        let mut cl = three_class_loss(0.25);
        let before = cl.centers().clone();
        let features = m(vec![vec![0.5, -1.0], vec![2.0, 2.0], vec![-3.0, 1.0]]);
        let labels = [2, 0, 1];
        let out = cl.forward(&features, &labels).unwrap();
        for (i, &label) in labels.iter().enumerate() {
            for d in 0..2 {
                let expected = before.data[label][d] + 0.25 * out.diff.data[i][d];
                assert!((cl.centers().data[label][d] - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn repeated_labels_accumulate() {
        let mut cl = three_class_loss(0.1);
        let features = m(vec![vec![2.0, 0.0], vec![1.0, 3.0], vec![1.0, -1.0]]);
        cl.forward(&features, &[0, 0, 0]).unwrap();
        // diffs: [1,0], [0,3], [0,-1] -> sum [1,2]
        assert!((cl.centers().data[0][0] - 1.1).abs() < 1e-12);
        assert!((cl.centers().data[0][1] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn loss_is_zero_only_on_the_centroids() {
        let mut cl = three_class_loss(0.5);
        let on_center = m(vec![vec![1.0, 0.0], vec![0.0, 0.0]]);
        let out = cl.forward(&on_center, &[0, 2]).unwrap();
        assert_eq!(out.loss, 0.0);
        assert_eq!(cl.centers(), three_class_loss(0.5).centers());

        let off_center = m(vec![vec![1.0, 1e-3]]);
        assert!(cl.forward(&off_center, &[0]).unwrap().loss > 0.0);
    }

    #[test]
    fn grad_is_twice_the_difference() {
        let mut cl = three_class_loss(0.0);
        let out = cl.forward(&m(vec![vec![0.0, 4.0]]), &[1]).unwrap();
        assert_eq!(out.grad().data, vec![vec![0.0, 6.0]]);
    }

    #[test]
    fn errors_leave_the_table_untouched() {
        let mut cl = three_class_loss(0.1);
        let before = cl.centers().clone();

        let err = cl.forward(&m(vec![vec![1.0, 1.0]]), &[3]).unwrap_err();
        assert!(matches!(err, CenterLossError::LabelOutOfRange { label: 3, num_classes: 3 }));

        let err = cl.forward(&m(vec![vec![1.0, 1.0]]), &[0, 1]).unwrap_err();
        assert!(matches!(err, CenterLossError::ShapeMismatch { what: "batch", .. }));

        let err = cl.forward(&m(vec![vec![1.0, 1.0, 1.0]]), &[0]).unwrap_err();
        assert!(matches!(err, CenterLossError::ShapeMismatch { what: "feature dim", .. }));

        assert_eq!(cl.centers(), &before);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut cl = three_class_loss(0.1);
        let out = cl.forward(&Matrix::default(), &[]).unwrap();
        assert_eq!(out.loss, 0.0);
        assert_eq!(out.diff.rows, 0);
        assert_eq!(cl.centers(), three_class_loss(0.1).centers());
    }

    #[test]
    fn loss_does_not_update() {
        let cl = three_class_loss(0.1);
        let loss = cl.loss(&m(vec![vec![2.0, 0.0]]), &[0]).unwrap();
        assert!((loss - 1.0).abs() < 1e-12);
        assert_eq!(cl.centers().data[0], vec![1.0, 0.0]);
    }

    #[test]
    fn initialisation_is_unit_norm() {
        let cl = CenterLoss::with_rng(10, 5, DEFAULT_ALPHA, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!((cl.num_classes(), cl.feat_dim()), (10, 5));
        for i in 0..10 {
            assert!((cl.centers().row_norm(i) - 1.0).abs() < 1e-9);
        }
        assert_eq!((cl.counter(), cl.nupdate()), (0, 0));
    }

    #[test]
    fn constructor_rejects_degenerate_shapes() {
        assert!(CenterLoss::new(0, 4, DEFAULT_ALPHA).is_err());
        assert!(CenterLoss::new(4, 0, DEFAULT_ALPHA).is_err());
        assert!(CenterLoss::new(4, 4, f64::NAN).is_err());
    }
}
