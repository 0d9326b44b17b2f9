use ndarray::{Array2, ArrayView2};

use super::{LossFn, target_weights};
use crate::Result;

/// Negative log-likelihood loss. Expects log-probabilities as predictions.
///
/// With class weights the mean is weighted, that is, the sum is divided by the sum of
/// the weights of the targets instead of the batch size.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Nll {
    weights: Option<Vec<f32>>,
}

impl Nll {
    /// Returns a new unweighted `Nll`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new `Nll` weighting each class.
    ///
    /// # Arguments
    /// * `weights` - One weight per class.
    pub fn weighted(weights: Vec<f32>) -> Self {
        Self {
            weights: Some(weights),
        }
    }

    pub fn weights(&self) -> Option<&[f32]> {
        self.weights.as_deref()
    }
}

impl LossFn for Nll {
    fn loss(&self, y_pred: ArrayView2<f32>, targets: &[usize]) -> Result<f32> {
        let (w, total) = target_weights(self.weights(), y_pred.ncols(), targets, y_pred.nrows())?;

        let sum: f32 = targets
            .iter()
            .zip(&w)
            .enumerate()
            .map(|(i, (&t, w))| -w * y_pred[[i, t]])
            .sum();

        Ok(sum / total)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, targets: &[usize]) -> Result<Array2<f32>> {
        let (w, total) = target_weights(self.weights(), y_pred.ncols(), targets, y_pred.nrows())?;

        let mut d = Array2::zeros(y_pred.raw_dim());
        for (i, (&t, w)) in targets.iter().zip(&w).enumerate() {
            d[[i, t]] = -w / total;
        }

        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn picks_the_log_probability_of_the_target() {
        let y = array![[-0.1, -2.0], [-3.0, -0.5]];
        let loss = Nll::new().loss(y.view(), &[0, 1]).unwrap();
        assert!((loss - 0.3).abs() < 1e-6);
    }

    #[test]
    fn weights_change_the_mean() {
        let y = array![[-1.0, -2.0], [-3.0, -4.0]];
        // (3 * 1 + 1 * 4) / (3 + 1)
        let loss = Nll::weighted(vec![3., 1.]).loss(y.view(), &[0, 1]).unwrap();
        assert!((loss - 1.75).abs() < 1e-6);

        let d = Nll::weighted(vec![3., 1.])
            .loss_prime(y.view(), &[0, 1])
            .unwrap();
        assert_eq!(d, array![[-0.75, 0.], [0., -0.25]]);
    }

    #[test]
    fn out_of_range_targets_are_rejected() {
        let y = array![[-1.0, -2.0]];
        assert!(Nll::new().loss(y.view(), &[2]).is_err());
    }
}
