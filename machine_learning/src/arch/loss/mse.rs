use ndarray::{Array2, ArrayView2};

use super::LossFn;

/// Mean squared error loss function, averaged over the outputs of each sample.
#[derive(Default, Clone, Copy, Debug)]
pub struct Mse;

impl Mse {
    /// Returns a new `Mse`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for Mse {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let outputs = y_pred.ncols().max(1) as f32;
        (&y_pred - &y).mapv(|x| x.powi(2)).sum() / outputs
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let outputs = y_pred.ncols().max(1) as f32;
        (&y_pred - &y) * (2.0 / outputs)
    }
}
