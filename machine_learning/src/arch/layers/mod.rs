mod conv;
mod dense;
mod layer;
mod pool;

pub use conv::Conv2d;
pub use dense::Dense;
pub use layer::Layer;
pub use pool::{Pool2d, PoolKind};

use ndarray::Array2;

/// Reuses a layer's scratch buffer across calls, only reallocating when the
/// batch shape changes.
trait InplaceReshape {
    fn fit_shape(&mut self, shape: (usize, usize));
}

impl<T: Clone + Default> InplaceReshape for Array2<T> {
    fn fit_shape(&mut self, shape: (usize, usize)) {
        if self.dim() != shape {
            *self = Array2::default(shape);
        }
    }
}
