use ndarray::{Array2, ArrayView2};

use super::layout::ParamTensor;
use crate::Result;

/// A differentiable model whose parameters live outside of it, in a flat `f32` vector.
pub trait Model: Send {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Returns the named tensors the flat parameter vector is made of, in order.
    fn layout(&self) -> Vec<ParamTensor>;

    /// Makes a forward pass through the model.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input data, one sample per row.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    fn forward<'a>(
        &'a mut self,
        params: &[f32],
        x: ArrayView2<'a, f32>,
    ) -> Result<ArrayView2<'a, f32>>;

    /// Backpropagates the delta of the last forward pass.
    ///
    /// # Arguments
    /// * `params` - The same parameters used in the forward pass.
    /// * `grad` - A buffer, as long as `params`, that gets overwritten with the gradient.
    /// * `d_out` - The gradient of the loss with respect to the model's output.
    ///
    /// # Returns
    /// The gradient of the loss with respect to the model's input.
    fn backward(&mut self, params: &[f32], grad: &mut [f32], d_out: Array2<f32>)
    -> Result<Array2<f32>>;
}
