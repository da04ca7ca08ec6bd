use ndarray::{Zip, prelude::*};
use rayon::prelude::*;

use super::InplaceReshape;
use crate::{MlErr, Result, arch::activations::ActFn};

/// The spatial bookkeeping of a convolution, shared with the worker closures.
#[derive(Clone, Copy, Debug)]
struct Geometry {
    channels: usize,
    height: usize,
    width: usize,
    kernel: usize,
    out_h: usize,
    out_w: usize,
}

impl Geometry {
    fn patch(&self) -> usize {
        self.channels * self.kernel * self.kernel
    }

    fn positions(&self) -> usize {
        self.out_h * self.out_w
    }

    fn input_len(&self) -> usize {
        self.channels * self.height * self.width
    }
}

/// A 2D convolution with unit stride and no padding.
///
/// Samples travel as rows of a matrix with their features laid out as
/// `channels × height × width`. The weights are stored as a
/// `filters × (channels · kernel · kernel)` matrix followed by one bias per filter.
#[derive(Clone, Debug)]
pub struct Conv2d {
    geometry: Geometry,
    filters: usize,
    act_fn: Option<ActFn>,

    x: Array2<f32>,
    z: Array2<f32>,
    a: Array2<f32>,
    d: Array2<f32>,
}

impl Conv2d {
    /// Creates a new `Conv2d`.
    ///
    /// # Arguments
    /// * `input` - The `(channels, height, width)` of each input sample.
    /// * `filters` - The amount of output channels.
    /// * `kernel` - The side of the square kernel.
    /// * `act_fn` - An optional activation applied to the outputs.
    ///
    /// # Panics
    /// If the kernel doesn't fit in the input.
    pub fn new(
        input: (usize, usize, usize),
        filters: usize,
        kernel: usize,
        act_fn: Option<ActFn>,
    ) -> Self {
        let (channels, height, width) = input;
        assert!(
            kernel > 0 && kernel <= height && kernel <= width,
            "kernel {kernel} doesn't fit in a {height}x{width} input"
        );

        let zeros = Array2::zeros((1, 1));

        Self {
            geometry: Geometry {
                channels,
                height,
                width,
                kernel,
                out_h: height - kernel + 1,
                out_w: width - kernel + 1,
            },
            filters,
            act_fn,
            x: zeros.clone(),
            z: zeros.clone(),
            a: zeros.clone(),
            d: zeros,
        }
    }

    pub fn size(&self) -> usize {
        self.filters * self.geometry.patch() + self.filters
    }

    /// The `(filters, height, width)` of each output sample.
    pub fn output(&self) -> (usize, usize, usize) {
        (self.filters, self.geometry.out_h, self.geometry.out_w)
    }

    pub fn input(&self) -> (usize, usize, usize) {
        let g = self.geometry;
        (g.channels, g.height, g.width)
    }

    pub fn filters(&self) -> usize {
        self.filters
    }

    pub fn kernel(&self) -> usize {
        self.geometry.kernel
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>> {
        let geometry = self.geometry;

        if x.ncols() != geometry.input_len() {
            return Err(MlErr::SizeMismatch {
                what: "conv input features",
                got: x.ncols(),
                expected: geometry.input_len(),
            });
        }

        let (w, b) = self.view_params(params)?;
        let positions = geometry.positions();

        self.x = x.as_standard_layout().into_owned();
        self.z.fit_shape((x.nrows(), self.filters * positions));

        Zip::from(self.z.rows_mut())
            .and(self.x.rows())
            .par_for_each(|mut z_row, x_row| {
                let cols = im2col(geometry, x_row);
                let out = w.dot(&cols);

                for (f, (out_row, &bias)) in out.rows().into_iter().zip(b.iter()).enumerate() {
                    let base = f * positions;
                    for (p, &v) in out_row.iter().enumerate() {
                        z_row[base + p] = v + bias;
                    }
                }
            });

        let Some(ref act_fn) = self.act_fn else {
            return Ok(self.z.view());
        };

        self.a.fit_shape(self.z.dim());
        self.a.zip_mut_with(&self.z, |a, &z| *a = act_fn.f(z));
        Ok(self.a.view())
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: ArrayViewMut2<f32>,
    ) -> Result<ArrayViewMut2<'_, f32>> {
        if d.dim() != self.z.dim() {
            return Err(MlErr::SizeMismatch {
                what: "conv delta",
                got: d.len(),
                expected: self.z.len(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let geometry = self.geometry;
        let filters = self.filters;
        let positions = geometry.positions();
        let (w, _) = self.view_params(params)?;
        let d = d.view();
        let x = &self.x;

        // Per-sample partial gradients are computed in parallel and summed in
        // sample order afterwards so the result doesn't depend on scheduling.
        let partials: Vec<_> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let cols = im2col(geometry, x.row(i));
                let d_i = Array2::from_shape_fn((filters, positions), |(f, p)| {
                    d[[i, f * positions + p]]
                });

                let dw_i = d_i.dot(&cols.t());
                let db_i = d_i.sum_axis(Axis(1));
                let dx_i = col2im(geometry, w.t().dot(&d_i).view());
                (dw_i, db_i, dx_i)
            })
            .collect();

        let (mut dw, mut db) = self.view_grad(grad)?;
        dw.fill(0.);
        db.fill(0.);

        self.d.fit_shape((partials.len(), geometry.input_len()));

        for (i, (dw_i, db_i, dx_i)) in partials.into_iter().enumerate() {
            dw += &dw_i;
            db += &db_i;
            self.d.row_mut(i).assign(&dx_i);
        }

        Ok(self.d.view_mut())
    }

    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("conv gradient", grad.len())?;

        let w_size = self.filters * self.geometry.patch();
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape((self.filters, self.geometry.patch()), dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.filters, db_raw)?;
        Ok((dw, db))
    }

    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("conv parameters", params.len())?;

        let w_size = self.filters * self.geometry.patch();
        let weights =
            ArrayView2::from_shape((self.filters, self.geometry.patch()), &params[..w_size])?;
        let biases = ArrayView1::from_shape(self.filters, &params[w_size..])?;
        Ok((weights, biases))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size() {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected: self.size(),
            });
        }

        Ok(())
    }
}

/// Unfolds every kernel-sized window of a sample into a column.
fn im2col(g: Geometry, x: ArrayView1<f32>) -> Array2<f32> {
    let k = g.kernel;
    let plane = g.height * g.width;

    Array2::from_shape_fn((g.patch(), g.positions()), |(row, col)| {
        let c = row / (k * k);
        let ki = (row / k) % k;
        let kj = row % k;
        let oy = col / g.out_w;
        let ox = col % g.out_w;
        x[c * plane + (oy + ki) * g.width + ox + kj]
    })
}

/// Folds columns back into a sample, adding up overlapping windows.
fn col2im(g: Geometry, cols: ArrayView2<f32>) -> Array1<f32> {
    let k = g.kernel;
    let plane = g.height * g.width;
    let mut x = Array1::zeros(g.input_len());

    for ((row, col), &v) in cols.indexed_iter() {
        let c = row / (k * k);
        let ki = (row / k) % k;
        let kj = row % k;
        let oy = col / g.out_w;
        let ox = col % g.out_w;
        x[c * plane + (oy + ki) * g.width + ox + kj] += v;
    }

    x
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn output_shape_shrinks_by_kernel() {
        let conv = Conv2d::new((1, 28, 28), 20, 3, None);
        assert_eq!(conv.output(), (20, 26, 26));
        assert_eq!(conv.size(), 20 * 9 + 20);
    }

    #[test]
    fn forward_matches_hand_computed_correlation() {
        let mut conv = Conv2d::new((1, 3, 3), 1, 2, None);
        let params = [1.0, 0.0, 0.0, 1.0, 0.5];
        let x = array![[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]];

        let y = conv.forward(&params, x.view()).unwrap();
        assert_eq!(y, array![[6.5, 8.5, 12.5, 14.5]]);
    }

    #[test]
    fn backward_matches_finite_differences() {
        let mut conv = Conv2d::new((2, 4, 4), 3, 3, Some(ActFn::tanh()));
        let params: Vec<f32> = (0..conv.size())
            .map(|i| ((i * 7 % 11) as f32 - 5.) / 20.)
            .collect();
        let x = Array2::from_shape_fn((2, 32), |(i, j)| ((i * 5 + j * 3) % 13) as f32 / 13.);

        let objective = |conv: &mut Conv2d, params: &[f32]| -> f32 {
            conv.forward(params, x.view()).unwrap().sum()
        };

        let out_dim = conv.forward(&params, x.view()).unwrap().dim();
        let mut grad = vec![0.; conv.size()];
        let mut d = Array2::ones(out_dim);
        let dx = conv.backward(&params, &mut grad, d.view_mut()).unwrap().to_owned();

        let h = 1e-2;
        for idx in [0, 5, 17, 30, conv.size() - 1] {
            let mut plus = params.clone();
            plus[idx] += h;
            let mut minus = params.clone();
            minus[idx] -= h;

            let numeric = (objective(&mut conv, &plus) - objective(&mut conv, &minus)) / (2. * h);
            assert!(
                (numeric - grad[idx]).abs() < 1e-2,
                "param {idx}: numeric {numeric} analytic {}",
                grad[idx]
            );
        }

        assert_eq!(dx.dim(), (2, 32));
    }
}
