use ndarray::{Array2, ArrayView2};

use crate::Result;

/// A differentiable function of a flat parameter vector.
///
/// Models don't own their parameters: the caller passes them on every call, which
/// allows replicas of the same model to share (or mirror) a single parameter buffer.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Makes a forward pass, caching whatever the backward pass will need.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input data.
    ///
    /// # Returns
    /// The model's output or an error if the shapes don't match.
    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Backpropagates the derivative of the loss with respect to the model's output
    /// of the last `forward` call, **accumulating** the gradient into `grad`.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grad` - A buffer of the same size as `params`.
    /// * `d` - The derivative of the loss with respect to the output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to the model's input.
    fn backward(&mut self, params: &[f32], grad: &mut [f32], d: Array2<f32>)
    -> Result<Array2<f32>>;
}
