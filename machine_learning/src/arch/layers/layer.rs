use ndarray::{ArrayView2, ArrayViewMut2};

use super::{Conv2d, Dense, Pool2d, PoolKind};
use crate::{
    Result,
    arch::{activations::ActFn, layout::ParamTensor},
};

/// One stage of a `Sequential` model.
#[derive(Clone, Debug)]
pub enum Layer {
    Dense(Dense),
    Conv2d(Conv2d),
    Pool2d(Pool2d),
}

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(dim, act_fn))
    }

    pub fn conv2d(
        input: (usize, usize, usize),
        filters: usize,
        kernel: usize,
        act_fn: Option<ActFn>,
    ) -> Self {
        Self::Conv2d(Conv2d::new(input, filters, kernel, act_fn))
    }

    pub fn pool2d(input: (usize, usize, usize), window: usize, kind: PoolKind) -> Self {
        Self::Pool2d(Pool2d::new(input, window, kind))
    }

    pub fn avg_pool2d(input: (usize, usize, usize), window: usize) -> Self {
        Self::pool2d(input, window, PoolKind::Avg)
    }

    pub fn max_pool2d(input: (usize, usize, usize), window: usize) -> Self {
        Self::pool2d(input, window, PoolKind::Max)
    }

    /// The amount of parameters this layer owns.
    pub fn size(&self) -> usize {
        match self {
            Self::Dense(l) => l.size(),
            Self::Conv2d(l) => l.size(),
            Self::Pool2d(_) => 0,
        }
    }

    /// The amount of features each input sample must have.
    pub fn input_len(&self) -> usize {
        match self {
            Self::Dense(l) => l.dim().0,
            Self::Conv2d(l) => volume(l.input()),
            Self::Pool2d(l) => volume(l.input()),
        }
    }

    /// The amount of features each output sample has.
    pub fn output_len(&self) -> usize {
        match self {
            Self::Dense(l) => l.dim().1,
            Self::Conv2d(l) => volume(l.output()),
            Self::Pool2d(l) => volume(l.output()),
        }
    }

    /// Describes the tensors this layer stores in the model's flat parameter vector.
    ///
    /// # Arguments
    /// * `index` - The position of the layer in its model, used to name the tensors.
    /// * `offset` - Where the layer's parameters start in the flat vector.
    pub fn layout(&self, index: usize, offset: usize) -> Vec<ParamTensor> {
        let (weight_shape, bias_len) = match self {
            Self::Dense(l) => {
                let (n_in, n_out) = l.dim();
                (vec![n_in, n_out], n_out)
            }
            Self::Conv2d(l) => {
                let (channels, _, _) = l.input();
                let k = l.kernel();
                (vec![l.filters(), channels, k, k], l.filters())
            }
            Self::Pool2d(_) => return Vec::new(),
        };

        let weight = ParamTensor::new(format!("layer{index}.weight"), weight_shape, offset);
        let bias = ParamTensor::new(
            format!("layer{index}.bias"),
            vec![bias_len],
            offset + weight.len(),
        );

        vec![weight, bias]
    }

    pub fn forward<'a>(
        &'a mut self,
        params: &[f32],
        x: ArrayView2<'a, f32>,
    ) -> Result<ArrayView2<'a, f32>> {
        match self {
            Self::Dense(l) => l.forward(params, x),
            Self::Conv2d(l) => l.forward(params, x),
            Self::Pool2d(l) => l.forward(x),
        }
    }

    pub fn backward<'a>(
        &'a mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayViewMut2<'a, f32>,
    ) -> Result<ArrayViewMut2<'a, f32>> {
        match self {
            Self::Dense(l) => l.backward(params, grad, d),
            Self::Conv2d(l) => l.backward(params, grad, d),
            Self::Pool2d(l) => l.backward(d),
        }
    }
}

fn volume((c, h, w): (usize, usize, usize)) -> usize {
    c * h * w
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_layout_names_weight_and_bias() {
        let layer = Layer::dense((3, 2), None);
        let layout = layer.layout(4, 10);

        assert_eq!(layout.len(), 2);
        assert_eq!(layout[0].name, "layer4.weight");
        assert_eq!(layout[0].shape, [3, 2]);
        assert_eq!(layout[0].range(), 10..16);
        assert_eq!(layout[1].name, "layer4.bias");
        assert_eq!(layout[1].range(), 16..18);
    }

    #[test]
    fn conv_layout_covers_its_size() {
        let layer = Layer::conv2d((20, 13, 13), 50, 5, Some(ActFn::relu()));
        let layout = layer.layout(2, 0);

        assert_eq!(layout[0].shape, [50, 20, 5, 5]);
        assert_eq!(layout[1].range().end, layer.size());
        assert_eq!(layer.output_len(), 50 * 9 * 9);
    }

    #[test]
    fn pool_has_no_parameters() {
        let layer = Layer::max_pool2d((20, 26, 26), 2);
        assert_eq!(layer.size(), 0);
        assert!(layer.layout(1, 7).is_empty());
        assert_eq!(layer.output_len(), 20 * 13 * 13);
    }
}
