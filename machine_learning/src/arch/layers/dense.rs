use ndarray::{linalg, prelude::*};
use rand::Rng;

use crate::{MlErr, Result, arch::activations::ActFn, initialization};

/// A fully connected layer with an optional fused activation.
///
/// When used inside a point-cloud network the rows of the input are points, so
/// the same weights are shared across every point of every cloud in the batch
/// (the equivalent of a 1x1 convolution).
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The (input, output) dimensions of the layer.
    /// * `act_fn` - The activation applied to the output, if any.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        let zeros = Array2::zeros((0, 0));

        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: zeros.clone(),
            z: zeros,
        }
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Writes freshly initialized parameters into `params`: kaiming-uniform weights
    /// and zero biases.
    ///
    /// # Arguments
    /// * `rng` - The random number generator to sample from.
    /// * `params` - This layer's parameter slice.
    pub fn init<R: Rng>(&self, rng: &mut R, params: &mut [f32]) -> Result<()> {
        self.check_len("params", params.len())?;
        let w_size = self.size - self.dim.1;
        let (w, b) = params.split_at_mut(w_size);
        initialization::kaiming_uniform(rng, self.dim.0, w)?;
        b.fill(0.);
        Ok(())
    }

    /// Computes `act(x · w + b)`, caching what the backward pass needs.
    ///
    /// # Arguments
    /// * `params` - This layer's parameter slice.
    /// * `x` - The input, one row per sample (or point).
    ///
    /// # Returns
    /// The layer's output or a size mismatch error.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_len("params", params.len())?;

        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input columns",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params);
        let mut z = Array2::zeros((x.nrows(), self.dim.1));
        linalg::general_mat_mul(1.0, &x, &w, 0.0, &mut z);
        z += &b;

        self.x = x.to_owned();

        let Some(act_fn) = self.act_fn else {
            self.z = Array2::zeros((0, 0));
            return Ok(z);
        };

        let a = z.mapv(|z| act_fn.f(z));
        self.z = z;
        Ok(a)
    }

    /// Backpropagates `d` through the layer, **accumulating** into `grad`.
    ///
    /// # Arguments
    /// * `params` - This layer's parameter slice.
    /// * `grad` - This layer's gradient slice.
    /// * `d` - The derivative of the loss with respect to this layer's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to this layer's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        self.check_len("params", params.len())?;
        self.check_len("grad", grad.len())?;

        if d.dim() != (self.x.nrows(), self.dim.1) {
            return Err(MlErr::SizeMismatch {
                what: "dense delta rows",
                got: d.nrows(),
                expected: self.x.nrows(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad);
        linalg::general_mat_mul(1.0, &self.x.t(), &d, 1.0, &mut dw);
        db += &d.sum_axis(Axis(0));

        let (w, _) = self.view_params(params);
        Ok(d.dot(&w.t()))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected: self.size,
            });
        }

        Ok(())
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    ///
    /// # Arguments
    /// * `grad` - A gradient slice, already checked against the layer's size.
    ///
    /// # Returns
    /// A tuple containing the delta weights and delta biases.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> (ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>) {
        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw).unwrap();
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw).unwrap();
        (dw, db)
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    ///
    /// # Arguments
    /// * `params` - A slice of parameters, already checked against the layer's size.
    ///
    /// # Returns
    /// A tuple containing the weights and biases.
    fn view_params<'a>(&self, params: &'a [f32]) -> (ArrayView2<'a, f32>, ArrayView1<'a, f32>) {
        let w_size = self.size - self.dim.1;
        let weights = ArrayView2::from_shape(self.dim, &params[..w_size]).unwrap();
        let biases = ArrayView1::from_shape(self.dim.1, &params[w_size..]).unwrap();
        (weights, biases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_computes_affine_map() {
        let mut dense = Dense::new((2, 1), None);
        // w = [[1], [2]], b = [0.5]
        let params = [1., 2., 0.5];
        let x = array![[1., 1.], [0., 3.]];

        let y = dense.forward(&params, x.view()).unwrap();
        assert_eq!(y, array![[3.5], [6.5]]);
    }

    #[test]
    fn backward_accumulates_gradients() {
        let mut dense = Dense::new((2, 1), None);
        let params = [1., 2., 0.5];
        let x = array![[1., 1.], [0., 3.]];
        let mut grad = [0.; 3];

        dense.forward(&params, x.view()).unwrap();
        let dx = dense.backward(&params, &mut grad, array![[1.], [1.]]).unwrap();
        assert_eq!(grad, [1., 4., 2.]);
        assert_eq!(dx, array![[1., 2.], [1., 2.]]);

        dense.forward(&params, x.view()).unwrap();
        dense.backward(&params, &mut grad, array![[1.], [1.]]).unwrap();
        assert_eq!(grad, [2., 8., 4.]);
    }

    #[test]
    fn relu_blocks_gradient_of_inactive_units() {
        let mut dense = Dense::new((1, 1), Some(ActFn::relu()));
        let params = [-1., 0.];
        let mut grad = [0.; 2];

        let y = dense.forward(&params, array![[2.]].view()).unwrap();
        assert_eq!(y, array![[0.]]);

        dense.backward(&params, &mut grad, array![[1.]]).unwrap();
        assert_eq!(grad, [0., 0.]);
    }

    #[test]
    fn wrong_param_len_is_rejected() {
        let mut dense = Dense::new((2, 2), None);
        let err = dense.forward(&[0.; 3], array![[1., 1.]].view()).unwrap_err();
        assert_eq!(
            err,
            MlErr::SizeMismatch {
                what: "params",
                got: 3,
                expected: 6
            }
        );
    }
}
