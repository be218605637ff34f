use rand::Rng;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;
use std::ops::{Add, Sub};

use crate::error::{CenterLossError, Result};

/// Lower bound on a row norm during normalisation, so zero rows stay zero.
pub const NORM_EPS: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix{
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<f64>>
}

impl Matrix{
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix{
            rows,
            cols,
            data: vec![vec![0.0; cols]; rows]
        }
    }

    /// Builds a matrix from row vectors, rejecting ragged input.
    ///
    /// An empty `data` yields a `0 × 0` matrix.
    pub fn from_data(data: Vec<Vec<f64>>) -> Result<Matrix> {
        let cols = data.first().map_or(0, |row| row.len());
        if let Some(bad) = data.iter().find(|row| row.len() != cols) {
            return Err(CenterLossError::ShapeMismatch {
                what: "matrix row",
                expected: cols,
                got: bad.len(),
            });
        }
        Ok(Matrix { rows: data.len(), cols, data })
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        // Both uniforms on (0, 1] to avoid log(0).
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// Matrix of independent N(0, 1) samples.
    pub fn standard_normal<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        let mut res = Matrix::zeros(rows, cols);
        for row in res.data.iter_mut() {
            for x in row.iter_mut() {
                *x = Matrix::sample_standard_normal(rng);
            }
        }
        res
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i]
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter()
                .map(|row| row.iter().map(|&x| functor(x)).collect())
                .collect(),
        }
    }

    pub fn scale(&self, k: f64) -> Matrix {
        self.map(|x| x * k)
    }

    /// L2 norm of row `i`.
    pub fn row_norm(&self, i: usize) -> f64 {
        self.data[i].iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    /// Divides each row by `max(||row||, NORM_EPS)`.
    pub fn normalize_rows(&self) -> Matrix {
        let data = self.data.iter()
            .map(|row| {
                let norm = row.iter().map(|x| x * x).sum::<f64>().sqrt().max(NORM_EPS);
                row.iter().map(|x| x / norm).collect()
            })
            .collect();
        Matrix { rows: self.rows, cols: self.cols, data }
    }

    /// Gathers rows by index into a new `indices.len() × cols` matrix.
    ///
    /// Callers validate the indices; an out-of-range index panics.
    pub fn index_select(&self, indices: &[usize]) -> Matrix {
        Matrix {
            rows: indices.len(),
            cols: self.cols,
            data: indices.iter().map(|&i| self.data[i].clone()).collect(),
        }
    }

    /// Scatter-add: `self[indices[i]] += alpha * src[i]` for every `i`.
    /// Repeated indices accumulate.
    pub fn index_add(&mut self, indices: &[usize], src: &Matrix, alpha: f64) {
        assert_eq!(indices.len(), src.rows, "one index per source row");
        assert_eq!(self.cols, src.cols, "Matrices are of incorrect sizes");
        for (&dst, row) in indices.iter().zip(src.data.iter()) {
            for (d, s) in self.data[dst].iter_mut().zip(row.iter()) {
                *d += alpha * s;
            }
        }
    }

    /// Pairwise Euclidean distances: `out[i][j] = ||self[i] - other[j]||`.
    pub fn cdist(&self, other: &Matrix) -> Matrix {
        assert_eq!(self.cols, other.cols, "Matrices are of incorrect sizes");
        let data = self.data.iter()
            .map(|a| {
                other.data.iter()
                    .map(|b| {
                        a.iter().zip(b.iter())
                            .map(|(x, y)| (x - y).powi(2))
                            .sum::<f64>()
                            .sqrt()
                    })
                    .collect()
            })
            .collect();
        Matrix { rows: self.rows, cols: other.rows, data }
    }

    pub fn sum_squares(&self) -> f64 {
        self.data.iter().flatten().map(|x| x * x).sum()
    }

    pub fn row_sums(&self) -> Vec<f64> {
        self.data.iter().map(|row| row.iter().sum()).collect()
    }

    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.cols];
        for row in &self.data {
            for (s, x) in sums.iter_mut().zip(row.iter()) {
                *s += x;
            }
        }
        sums
    }

    /// Smallest element, `None` when the matrix is empty.
    pub fn min(&self) -> Option<f64> {
        self.data.iter().flatten().copied().reduce(f64::min)
    }

    /// Largest element, `None` when the matrix is empty.
    pub fn max(&self) -> Option<f64> {
        self.data.iter().flatten().copied().reduce(f64::max)
    }

    /// Splits into consecutive row blocks of `size` rows; the last block
    /// holds the remainder.
    pub fn row_chunks(&self, size: usize) -> Vec<Matrix> {
        assert!(size > 0, "chunk size must be at least 1");
        self.data
            .chunks(size)
            .map(|rows| Matrix { rows: rows.len(), cols: self.cols, data: rows.to_vec() })
            .collect()
    }

    /// Concatenates row blocks that share a column count.
    pub fn vstack(parts: &[Matrix]) -> Matrix {
        let cols = parts.first().map_or(0, |m| m.cols);
        let mut data = Vec::with_capacity(parts.iter().map(|m| m.rows).sum());
        for part in parts {
            assert_eq!(part.cols, cols, "Matrices are of incorrect sizes");
            data.extend(part.data.iter().cloned());
        }
        Matrix { rows: data.len(), cols, data }
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

fn zip_with<F>(lhs: &Matrix, rhs: &Matrix, op: F) -> Matrix
where
    F: Fn(f64, f64) -> f64,
{
    if lhs.rows != rhs.rows || lhs.cols != rhs.cols {
        panic!("Matrices are of incorrect sizes")
    }

    let data = lhs.data.iter().zip(rhs.data.iter())
        .map(|(a, b)| a.iter().zip(b.iter()).map(|(&x, &y)| op(x, y)).collect())
        .collect();

    Matrix { rows: lhs.rows, cols: lhs.cols, data }
}

impl Add for &Matrix {
    type Output = Matrix;

    fn add(self, rhs: Self) -> Self::Output {
        zip_with(self, rhs, |x, y| x + y)
    }
}

impl Sub for &Matrix {
    type Output = Matrix;

    fn sub(self, rhs: Self) -> Self::Output {
        zip_with(self, rhs, |x, y| x - y)
    }
}

impl Add for Matrix {
    type Output = Matrix;

    fn add(self, rhs: Self) -> Self::Output {
        &self + &rhs
    }
}

impl Sub for Matrix {
    type Output = Matrix;

    fn sub(self, rhs: Self) -> Self::Output {
        &self - &rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn m(data: Vec<Vec<f64>>) -> Matrix {
        Matrix::from_data(data).unwrap()
    }

    #[test]
    fn from_data_rejects_ragged_rows() {
        let err = Matrix::from_data(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, CenterLossError::ShapeMismatch { expected: 2, got: 1, .. }));
    }

    #[test]
    fn normalize_rows_keeps_zero_rows_finite() {
        let n = m(vec![vec![3.0, 4.0], vec![0.0, 0.0]]).normalize_rows();
        assert_eq!(n.data[0], vec![0.6, 0.8]);
        assert_eq!(n.data[1], vec![0.0, 0.0]);
    }

    #[test]
    fn index_add_accumulates_repeated_indices() {
        let mut dst = Matrix::zeros(2, 2);
        let src = m(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
        dst.index_add(&[1, 1, 0], &src, 0.5);
        assert_eq!(dst.data[0], vec![2.5, 3.0]);
        assert_eq!(dst.data[1], vec![2.0, 3.0]);
    }

    #[test]
    fn cdist_matches_hand_computed_distances() {
        let a = m(vec![vec![0.0, 0.0], vec![3.0, 4.0]]);
        let d = a.cdist(&a);
        assert_eq!(d.data, vec![vec![0.0, 5.0], vec![5.0, 0.0]]);
    }

    #[test]
    fn row_chunks_put_remainder_last() {
        let a = Matrix::zeros(5, 1);
        let sizes: Vec<usize> = a.row_chunks(2).iter().map(|c| c.rows).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(Matrix::vstack(&a.row_chunks(2)), a);
    }

    #[test]
    fn standard_normal_is_reproducible_from_a_seed() {
        let a = Matrix::standard_normal(3, 4, &mut StdRng::seed_from_u64(7));
        let b = Matrix::standard_normal(3, 4, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert!(a.data.iter().flatten().all(|x| x.is_finite()));
    }

    #[test]
    fn min_max_of_empty_matrix_are_none() {
        assert_eq!(Matrix::zeros(0, 3).max(), None);
        assert_eq!(m(vec![vec![-1.0, 2.0]]).min(), Some(-1.0));
    }
}
