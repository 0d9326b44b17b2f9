use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{Dense, GlobalPool, LogSoftmax, PoolMode};
use crate::{Result, arch::activations::ActFn};

/// A layer of a `Sequential` model.
#[derive(Clone, Debug)]
pub enum Layer {
    Dense(Dense),
    Pool(GlobalPool),
    LogSoftmax(LogSoftmax),
}
use Layer::*;

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(super::Dense::new(dim, act_fn))
    }

    pub fn pool(points: usize, mode: PoolMode) -> Self {
        Self::Pool(GlobalPool::new(points, mode))
    }

    pub fn log_softmax() -> Self {
        Self::LogSoftmax(super::LogSoftmax::new())
    }

    /// Returns the amount of parameters this layer owns.
    pub fn size(&self) -> usize {
        match self {
            Dense(l) => l.size(),
            Pool(_) | LogSoftmax(_) => 0,
        }
    }

    pub fn init<R: Rng>(&self, rng: &mut R, params: &mut [f32]) -> Result<()> {
        match self {
            Dense(l) => l.init(rng, params),
            Pool(_) | LogSoftmax(_) => Ok(()),
        }
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.forward(params, x),
            Pool(l) => l.forward(x),
            LogSoftmax(l) => Ok(l.forward(x)),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.backward(params, grad, d),
            Pool(l) => l.backward(d),
            LogSoftmax(l) => l.backward(d),
        }
    }
}
