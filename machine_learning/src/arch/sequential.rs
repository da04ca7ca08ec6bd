use ndarray::{Array2, ArrayView2};

use super::{Model, layers::Layer, layout::ParamTensor};
use crate::{MlErr, Result, initialization::ParamGen};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The model doesn't own its parameters, every pass receives the flat parameter vector and
/// slices it layer by layer, so the same model can be cloned next to many parameter replicas.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Checks every layer consumes the amount of features the previous one produces.
    pub fn check_shapes(&self) -> Result<()> {
        for pair in self.layers.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);

            if prev.output_len() != next.input_len() {
                return Err(MlErr::SizeMismatch {
                    what: "consecutive layer features",
                    got: prev.output_len(),
                    expected: next.input_len(),
                });
            }
        }

        Ok(())
    }

    /// Draws a fresh parameter vector for this model.
    ///
    /// # Arguments
    /// * `param_gen` - The generator to sample from, must yield exactly `size` values.
    pub fn init_params<G: ParamGen + ?Sized>(&self, param_gen: &mut G) -> Result<Vec<f32>> {
        let size = self.size();
        let params = param_gen.sample(size).unwrap_or_default();

        if params.len() != size {
            return Err(MlErr::SizeMismatch {
                what: "initial parameters",
                got: params.len(),
                expected: size,
            });
        }

        Ok(params)
    }

    fn check_params(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();

        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn layout(&self) -> Vec<ParamTensor> {
        let mut offset = 0;
        let mut layout = Vec::new();

        for (i, layer) in self.layers.iter().enumerate() {
            layout.extend(layer.layout(i, offset));
            offset += layer.size();
        }

        layout
    }

    fn forward<'a>(
        &'a mut self,
        params: &[f32],
        mut x: ArrayView2<'a, f32>,
    ) -> Result<ArrayView2<'a, f32>> {
        self.check_params("model parameters", params.len())?;
        let mut offset = 0;

        for layer in self.layers.iter_mut() {
            let size = layer.size();
            x = layer.forward(&params[offset..offset + size], x)?;
            offset += size;
        }

        Ok(x)
    }

    fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d_out: Array2<f32>,
    ) -> Result<Array2<f32>> {
        self.check_params("model parameters", params.len())?;
        self.check_params("model gradient", grad.len())?;

        let mut end = params.len();
        let mut d = d_out.view_mut();

        for layer in self.layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(d.to_owned())
    }
}
