use ndarray::{Array2, ArrayView2};

use super::{CrossEntropy, LossFn, Nll};
use crate::Result;

/// The losses a classifier can be trained with.
#[derive(Clone, Debug, PartialEq)]
pub enum Criterion {
    Nll(Nll),
    CrossEntropy(CrossEntropy),
}

impl LossFn for Criterion {
    fn loss(&self, y_pred: ArrayView2<f32>, targets: &[usize]) -> Result<f32> {
        match self {
            Self::Nll(l) => l.loss(y_pred, targets),
            Self::CrossEntropy(l) => l.loss(y_pred, targets),
        }
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, targets: &[usize]) -> Result<Array2<f32>> {
        match self {
            Self::Nll(l) => l.loss_prime(y_pred, targets),
            Self::CrossEntropy(l) => l.loss_prime(y_pred, targets),
        }
    }
}
