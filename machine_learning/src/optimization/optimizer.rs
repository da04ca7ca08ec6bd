use crate::Result;

/// Defines the strategy for updating model parameters based on calculated gradients.
pub trait Optimizer: Send {
    /// Updates the parameters using a gradient summed over a whole batch.
    ///
    /// # Arguments
    /// * `grad` - The gradient of the loss summed over `batch_size` samples.
    /// * `params` - The parameters to update.
    /// * `batch_size` - The amount of samples `grad` was summed over.
    ///
    /// # Returns
    /// An error if there's a mismatch in the sizes of `grad` and `params`.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32], batch_size: usize) -> Result<()>;
}

pub(super) fn check_sizes(grad: &[f32], params: &[f32]) -> Result<()> {
    if grad.len() != params.len() {
        return Err(crate::MlErr::SizeMismatch {
            what: "optimizer gradient",
            got: grad.len(),
            expected: params.len(),
        });
    }

    Ok(())
}
