use ndarray::{Array2, ArrayView2, Zip};

use super::LossFn;

/// Binary cross-entropy computed directly on logits.
///
/// Uses `max(z, 0) - z * y + ln(1 + e^-|z|)` so large logits never overflow.
#[derive(Default, Clone, Copy, Debug)]
pub struct BinaryCrossEntropy;

impl BinaryCrossEntropy {
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for BinaryCrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        Zip::from(&y_pred).and(&y).fold(0., |acc, &z, &t| {
            acc + z.max(0.) - z * t + (-z.abs()).exp().ln_1p()
        })
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        Zip::from(&y_pred)
            .and(&y)
            .map_collect(|&z, &t| 1. / (1. + (-z).exp()) - t)
    }
}
