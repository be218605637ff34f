use crate::math::matrix::Matrix;

pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }

    /// Applies one SGD update to the rows of `params` selected by `rows`:
    /// `params[rows[i]] -= lr * grads[i]`.
    pub fn step_rows(&self, params: &mut Matrix, rows: &[usize], grads: &Matrix) {
        params.index_add(rows, grads, -self.learning_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_rows_descends_only_selected_rows() {
        let mut params = Matrix::from_data(vec![vec![1.0, 1.0], vec![2.0, 2.0]]).unwrap();
        let grads = Matrix::from_data(vec![vec![10.0, -10.0]]).unwrap();
        Sgd::new(0.1).step_rows(&mut params, &[1], &grads);
        assert_eq!(params.data[0], vec![1.0, 1.0]);
        assert_eq!(params.data[1], vec![1.0, 3.0]);
    }
}
