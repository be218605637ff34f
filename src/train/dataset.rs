use rand::Rng;

use crate::math::matrix::Matrix;

/// Gaussian blobs in `feat_dim` dimensions, one per class.
///
/// Class means are drawn from N(0, 1); each sample is its class mean plus
/// N(0, spread²) noise. Samples are emitted class by class, so `labels` is
/// `[0, 0, ..., 1, 1, ...]`. Returns `(samples, labels)`.
pub fn gaussian_blobs<R: Rng + ?Sized>(
    num_classes: usize,
    feat_dim: usize,
    per_class: usize,
    spread: f64,
    rng: &mut R,
) -> (Matrix, Vec<usize>) {
    let means = Matrix::standard_normal(num_classes, feat_dim, rng);
    let noise = Matrix::standard_normal(num_classes * per_class, feat_dim, rng);

    let mut labels = Vec::with_capacity(num_classes * per_class);
    let mut data: Vec<Vec<f64>> = Vec::with_capacity(num_classes * per_class);
    for class in 0..num_classes {
        for i in 0..per_class {
            let row = noise.row(class * per_class + i);
            data.push(
                means.row(class).iter().zip(row.iter())
                    .map(|(m, n)| m + spread * n)
                    .collect(),
            );
            labels.push(class);
        }
    }

    (Matrix { rows: data.len(), cols: feat_dim, data }, labels)
}
