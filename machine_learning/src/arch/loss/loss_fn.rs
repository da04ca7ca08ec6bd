use ndarray::{Array2, ArrayView2};

/// A loss function over a batch of predictions, one sample per row.
///
/// Losses are *summed* over the rows of the batch and `loss_prime` returns the
/// gradient of that sum, so gradients of different shards of a batch can be
/// added together and normalized once by the full batch size.
pub trait LossFn: Send {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32;
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32>;
}
