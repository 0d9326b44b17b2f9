use ndarray::{Array2, ArrayView2};

use super::{LossFn, Nll, target_weights};
use crate::{Result, arch::layers::log_softmax};

/// Cross-entropy loss over raw scores: `nll(log_softmax(y_pred))`.
///
/// Feeding it log-probabilities is also fine, `log_softmax` is idempotent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CrossEntropy {
    nll: Nll,
}

impl CrossEntropy {
    /// Returns a new unweighted `CrossEntropy`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new `CrossEntropy` weighting each class.
    ///
    /// # Arguments
    /// * `weights` - One weight per class.
    pub fn weighted(weights: Vec<f32>) -> Self {
        Self {
            nll: Nll::weighted(weights),
        }
    }
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, targets: &[usize]) -> Result<f32> {
        self.nll.loss(log_softmax(y_pred).view(), targets)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, targets: &[usize]) -> Result<Array2<f32>> {
        let weights = self.nll.weights();
        let (w, total) = target_weights(weights, y_pred.ncols(), targets, y_pred.nrows())?;

        // (softmax(z) - onehot(t)) * w[t] / sum(w)
        let mut d = log_softmax(y_pred).mapv_into(f32::exp);
        for (i, (mut row, &t)) in d.rows_mut().into_iter().zip(targets).enumerate() {
            row[t] -= 1.;
            row *= w[i] / total;
        }

        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn equals_nll_of_log_softmax() {
        let z = array![[2.0, 0.5], [0.1, 0.3]];
        let ce = CrossEntropy::new().loss(z.view(), &[1, 0]).unwrap();
        let nll = Nll::new()
            .loss(log_softmax(z.view()).view(), &[1, 0])
            .unwrap();
        assert!((ce - nll).abs() < 1e-6);
    }

    #[test]
    fn gradient_rows_sum_to_zero() {
        let z = array![[2.0, 0.5, -1.0]];
        let d = CrossEntropy::new().loss_prime(z.view(), &[2]).unwrap();
        assert!(d.sum().abs() < 1e-6);
        assert!(d[[0, 2]] < 0.);
    }

    #[test]
    fn matches_finite_differences() {
        let z = array![[0.2, -0.4], [1.0, 0.0]];
        let targets = [1, 0];
        let loss = CrossEntropy::weighted(vec![2., 1.]);
        let d = loss.loss_prime(z.view(), &targets).unwrap();

        let eps = 1e-3;
        for i in 0..2 {
            for j in 0..2 {
                let mut plus = z.clone();
                plus[[i, j]] += eps;
                let mut minus = z.clone();
                minus[[i, j]] -= eps;
                let numeric = (loss.loss(plus.view(), &targets).unwrap()
                    - loss.loss(minus.view(), &targets).unwrap())
                    / (2. * eps);
                assert!((numeric - d[[i, j]]).abs() < 1e-3);
            }
        }
    }
}
