use super::{Optimizer, optimizer::check_sizes};
use crate::Result;

/// Gradient descent optimization algorithm.
#[derive(Clone, Debug)]
pub struct GradientDescent {
    learning_rate: f32,
}

impl GradientDescent {
    /// Returns a new `GradientDescent`.
    ///
    /// # Arguments
    /// * `learning_rate` - The *length* of the steps taken on `update_params`.
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }
}

impl Optimizer for GradientDescent {
    /// Makes a step in the opposite direction of the mean gradient, that is
    /// `param -= learning_rate * grad / batch_size`.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32], batch_size: usize) -> Result<()> {
        check_sizes(grad, params)?;

        let lr = self.learning_rate;
        let scale = 1.0 / batch_size.max(1) as f32;

        for (p, g) in params.iter_mut().zip(grad) {
            *p -= lr * (g * scale);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_is_normalized_by_batch_size() {
        let mut sgd = GradientDescent::new(0.5);
        let mut params = [1.0, -1.0];

        sgd.update_params(&[4.0, -8.0], &mut params, 4).unwrap();
        assert_eq!(params, [0.5, 0.0]);
    }

    #[test]
    fn mismatched_lengths_fail() {
        let mut sgd = GradientDescent::new(0.5);
        assert!(sgd.update_params(&[1.0], &mut [0.0, 0.0], 1).is_err());
    }
}
