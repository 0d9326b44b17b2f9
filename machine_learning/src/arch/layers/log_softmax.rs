use ndarray::prelude::*;

use crate::{MlErr, Result};

/// Row-wise `log(softmax(z))`, computed in a numerically stable way.
pub fn log_softmax(z: ArrayView2<f32>) -> Array2<f32> {
    let mut y = z.to_owned();

    for mut row in y.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        let lse = max + row.mapv(|v| (v - max).exp()).sum().ln();
        row.mapv_inplace(|v| v - lse);
    }

    y
}

/// Output layer turning logits into log-probabilities.
#[derive(Clone, Debug, Default)]
pub struct LogSoftmax {
    y: Array2<f32>,
}

impl LogSoftmax {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, z: ArrayView2<f32>) -> Array2<f32> {
        self.y = log_softmax(z);
        self.y.clone()
    }

    /// `dz = d - softmax(z) * sum(d)` for every row.
    pub fn backward(&mut self, mut d: Array2<f32>) -> Result<Array2<f32>> {
        if d.dim() != self.y.dim() {
            return Err(MlErr::SizeMismatch {
                what: "log softmax delta",
                got: d.len(),
                expected: self.y.len(),
            });
        }

        for (mut d_row, y_row) in d.rows_mut().into_iter().zip(self.y.rows()) {
            let total = d_row.sum();
            d_row.zip_mut_with(&y_row, |d, &y| *d -= y.exp() * total);
        }

        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_exponentiate_to_one() {
        let y = log_softmax(array![[1., 2., 3.], [1000., 0., -1000.]].view());

        for row in y.rows() {
            let total: f32 = row.iter().map(|v| v.exp()).sum();
            assert!((total - 1.).abs() < 1e-5);
        }
    }

    #[test]
    fn backward_matches_the_closed_form() {
        let mut layer = LogSoftmax::new();
        layer.forward(array![[0.3, -1.2]].view());

        // d/dz of sum(log_softmax(z)) * c is c - 2c * softmax, so with d = [1, 1]
        // each entry is 1 - 2 * p.
        let dz = layer.backward(array![[1., 1.]]).unwrap();
        let p0 = (0.3f32).exp() / ((0.3f32).exp() + (-1.2f32).exp());
        assert!((dz[[0, 0]] - (1. - 2. * p0)).abs() < 1e-5);
        assert!((dz.sum()).abs() < 1e-5);
    }
}
