use ndarray::{Array2, ArrayView2};

use crate::Result;

/// A classification loss over a batch of predictions, one row per sample.
pub trait LossFn {
    /// Computes the (weighted) mean loss of the batch.
    fn loss(&self, y_pred: ArrayView2<f32>, targets: &[usize]) -> Result<f32>;

    /// Computes the derivative of `loss` with respect to `y_pred`.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, targets: &[usize]) -> Result<Array2<f32>>;
}
