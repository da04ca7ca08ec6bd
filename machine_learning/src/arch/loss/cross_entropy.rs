use ndarray::{Array2, ArrayView2, Axis, Zip};

use super::LossFn;

/// Softmax followed by cross-entropy against one-hot (or soft) targets.
///
/// The model is expected to output raw logits.
#[derive(Default, Clone, Copy, Debug)]
pub struct SoftmaxCrossEntropy;

impl SoftmaxCrossEntropy {
    pub fn new() -> Self {
        Self
    }

    /// Row-wise numerically stable softmax.
    pub fn softmax(logits: ArrayView2<f32>) -> Array2<f32> {
        let mut out = logits.to_owned();

        for mut row in out.axis_iter_mut(Axis(0)) {
            let max = row.fold(f32::NEG_INFINITY, |m, &z| m.max(z));
            row.mapv_inplace(|z| (z - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|e| e / sum);
        }

        out
    }
}

impl LossFn for SoftmaxCrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let mut total = 0.;

        Zip::from(y_pred.rows()).and(y.rows()).for_each(|logits, target| {
            let max = logits.fold(f32::NEG_INFINITY, |m, &z| m.max(z));
            let log_sum = logits.fold(0., |acc, &z| acc + (z - max).exp()).ln() + max;

            total += Zip::from(&logits)
                .and(&target)
                .fold(0., |acc, &z, &t| acc - t * (z - log_sum));
        });

        total
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        Self::softmax(y_pred) - y
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn uniform_logits_give_log_of_classes() {
        let logits = array![[0.0, 0.0, 0.0, 0.0]];
        let y = array![[0.0, 1.0, 0.0, 0.0]];

        let loss = SoftmaxCrossEntropy.loss(logits.view(), y.view());
        assert!((loss - 4f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn softmax_is_stable_for_large_logits() {
        let logits = array![[1000.0, 1000.0]];
        let probs = SoftmaxCrossEntropy::softmax(logits.view());
        assert_eq!(probs, array![[0.5, 0.5]]);
    }

    #[test]
    fn gradient_is_softmax_minus_target() {
        let logits = array![[0.0, 0.0], [0.0, 0.0]];
        let y = array![[1.0, 0.0], [0.0, 1.0]];

        let d = SoftmaxCrossEntropy.loss_prime(logits.view(), y.view());
        assert_eq!(d, array![[-0.5, 0.5], [0.5, -0.5]]);
    }
}
