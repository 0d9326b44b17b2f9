use std::mem;

use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{Model, layers::Layer};
use crate::{MlErr, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Writes freshly initialized parameters for every layer into `params`.
    ///
    /// # Arguments
    /// * `rng` - The random number generator to sample from.
    /// * `params` - The model's parameters.
    pub fn init_params<R: Rng>(&self, rng: &mut R, params: &mut [f32]) -> Result<()> {
        self.check_len("params", params.len())?;
        let mut rest = params;

        for layer in &self.layers {
            let (head, tail) = mem::take(&mut rest).split_at_mut(layer.size());
            layer.init(rng, head)?;
            rest = tail;
        }

        Ok(())
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();

        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_len("params", params.len())?;

        let mut rest = params;
        let mut x = x.to_owned();

        for layer in self.layers.iter_mut() {
            let (head, tail) = rest.split_at(layer.size());
            x = layer.forward(head, x.view())?;
            rest = tail;
        }

        Ok(x)
    }

    fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        self.check_len("params", params.len())?;
        self.check_len("grad", grad.len())?;

        let mut end = params.len();

        for layer in self.layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(d)
    }
}
