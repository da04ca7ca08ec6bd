use std::ops::Range;

use machine_learning::{
    MlErr,
    arch::{Model, count_correct, loss::LossFn},
    optimization::Optimizer,
};

use crate::{Result, all_reduce::sum_into, partition::Shard, stats::StepStats};

/// One device's copy of the model: its parameters, gradient buffer and optimizer state.
pub struct Replica {
    model: Box<dyn Model>,
    loss_fn: Box<dyn LossFn>,
    optimizer: Box<dyn Optimizer>,
    params: Vec<f32>,
    grad: Vec<f32>,
}

impl Replica {
    /// Creates a new `Replica`.
    ///
    /// # Arguments
    /// * `model` - The architecture, holding this replica's layer caches.
    /// * `loss_fn` - The loss whose gradient is computed on every forward/backward.
    /// * `optimizer` - Applies the reduced gradient to this replica's parameters.
    /// * `params` - The initial parameters, shared by every replica.
    ///
    /// # Returns
    /// An error if `params` doesn't match the model's size.
    pub fn new(
        model: Box<dyn Model>,
        loss_fn: Box<dyn LossFn>,
        optimizer: Box<dyn Optimizer>,
        params: Vec<f32>,
    ) -> Result<Self> {
        if params.len() != model.size() {
            return Err(MlErr::SizeMismatch {
                what: "replica parameters",
                got: params.len(),
                expected: model.size(),
            }
            .into());
        }

        let grad = vec![0.0; params.len()];

        Ok(Self {
            model,
            loss_fn,
            optimizer,
            params,
            grad,
        })
    }

    /// Runs the model on the shard and leaves the gradient of the summed loss in the
    /// gradient buffer.
    pub fn forward_backward(&mut self, shard: &Shard) -> Result<StepStats> {
        let y_pred = self.model.forward(&self.params, shard.x.view())?;
        let loss = self.loss_fn.loss(y_pred, shard.y.view());
        let correct = count_correct(y_pred, shard.y.view());
        let d = self.loss_fn.loss_prime(y_pred, shard.y.view());

        self.model.backward(&self.params, &mut self.grad, d)?;

        Ok(StepStats {
            loss,
            samples: shard.len(),
            correct,
        })
    }

    /// Runs the model forward only, the gradient buffer is left untouched.
    pub fn evaluate(&mut self, shard: &Shard) -> Result<StepStats> {
        let y_pred = self.model.forward(&self.params, shard.x.view())?;

        Ok(StepStats {
            loss: self.loss_fn.loss(y_pred, shard.y.view()),
            samples: shard.len(),
            correct: count_correct(y_pred, shard.y.view()),
        })
    }

    pub fn grad(&self, range: Range<usize>) -> Result<&[f32]> {
        let len = self.grad.len();
        self.grad.get(range.clone()).ok_or_else(|| out_of_bounds(range, len))
    }

    /// Adds `values` into the given range of the gradient buffer.
    pub fn accumulate_grad(&mut self, range: Range<usize>, values: &[f32]) -> Result<()> {
        let len = self.grad.len();
        let dst = self
            .grad
            .get_mut(range.clone())
            .ok_or_else(|| out_of_bounds(range, len))?;

        sum_into(dst, values)
    }

    /// Overwrites the given range of the gradient buffer with `values`.
    pub fn write_grad(&mut self, range: Range<usize>, values: &[f32]) -> Result<()> {
        let len = self.grad.len();
        let dst = self
            .grad
            .get_mut(range.clone())
            .ok_or_else(|| out_of_bounds(range, len))?;

        if dst.len() != values.len() {
            return Err(MlErr::SizeMismatch {
                what: "written gradient",
                got: values.len(),
                expected: dst.len(),
            }
            .into());
        }

        dst.copy_from_slice(values);
        Ok(())
    }

    /// Applies the gradient buffer, summed over `batch_size` samples, to the parameters.
    pub fn update(&mut self, batch_size: usize) -> Result<()> {
        self.optimizer
            .update_params(&self.grad, &mut self.params, batch_size)?;
        Ok(())
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }
}

fn out_of_bounds(range: Range<usize>, len: usize) -> crate::DpErr {
    MlErr::SizeMismatch {
        what: "gradient range",
        got: range.end,
        expected: len,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use machine_learning::{
        arch::{Sequential, layers::Layer, loss::Mse},
        optimization::GradientDescent,
    };
    use ndarray::array;

    use super::*;

    fn replica(params: Vec<f32>) -> Replica {
        let model = Sequential::new([Layer::dense((2, 1), None)]);
        Replica::new(
            Box::new(model),
            Box::new(Mse),
            Box::new(GradientDescent::new(1.0)),
            params,
        )
        .unwrap()
    }

    #[test]
    fn wrong_parameter_count_is_rejected() {
        let model = Sequential::new([Layer::dense((2, 1), None)]);
        let result = Replica::new(
            Box::new(model),
            Box::new(Mse),
            Box::new(GradientDescent::new(1.0)),
            vec![0.0; 2],
        );
        assert!(result.is_err());
    }

    #[test]
    fn forward_backward_fills_the_gradient() {
        let mut replica = replica(vec![1.0, 2.0, 0.5]);
        let shard = Shard {
            x: array![[1.0, 1.0], [2.0, 0.0]],
            y: array![[3.5], [1.5]],
        };

        let stats = replica.forward_backward(&shard).unwrap();

        // predictions are [3.5, 2.5], only the second sample is off by 1
        assert_eq!(stats.loss, 1.0);
        assert_eq!(stats.samples, 2);
        assert_eq!(replica.grad(0..3).unwrap(), [4.0, 0.0, 2.0]);
    }

    #[test]
    fn accumulate_then_write() {
        let mut replica = replica(vec![0.0; 3]);

        replica.accumulate_grad(0..2, &[1.0, 2.0]).unwrap();
        replica.accumulate_grad(0..2, &[1.0, 2.0]).unwrap();
        assert_eq!(replica.grad(0..3).unwrap(), [2.0, 4.0, 0.0]);

        replica.write_grad(1..3, &[7.0, 8.0]).unwrap();
        assert_eq!(replica.grad(0..3).unwrap(), [2.0, 7.0, 8.0]);

        assert!(replica.write_grad(2..4, &[0.0, 0.0]).is_err());
    }

    #[test]
    fn update_divides_by_batch_size() {
        let mut replica = replica(vec![1.0, 1.0, 1.0]);
        replica.write_grad(0..3, &[2.0, 4.0, 6.0]).unwrap();

        replica.update(2).unwrap();
        assert_eq!(replica.params(), [0.0, -1.0, -2.0]);
    }
}
