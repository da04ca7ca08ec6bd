use ndarray::{Zip, prelude::*};
use serde::{Deserialize, Serialize};

use super::InplaceReshape;
use crate::{MlErr, Result};

/// How a pooling window is reduced to a single value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    #[default]
    Avg,
    Max,
}

/// A parameterless 2D pooling layer with a square window and a stride equal to the window.
///
/// Trailing rows and columns that don't fill a whole window are dropped.
#[derive(Clone, Debug)]
pub struct Pool2d {
    input: (usize, usize, usize),
    window: usize,
    kind: PoolKind,

    out: Array2<f32>,
    argmax: Array2<usize>,
    d: Array2<f32>,
}

impl Pool2d {
    /// Creates a new `Pool2d`.
    ///
    /// # Arguments
    /// * `input` - The `(channels, height, width)` of each input sample.
    /// * `window` - The side of the pooling window.
    /// * `kind` - Average or max pooling.
    ///
    /// # Panics
    /// If the window is empty or larger than the input.
    pub fn new(input: (usize, usize, usize), window: usize, kind: PoolKind) -> Self {
        let (_, height, width) = input;
        assert!(
            window > 0 && window <= height && window <= width,
            "pool window {window} doesn't fit in a {height}x{width} input"
        );

        Self {
            input,
            window,
            kind,
            out: Array2::zeros((1, 1)),
            argmax: Array2::zeros((1, 1)),
            d: Array2::zeros((1, 1)),
        }
    }

    pub fn input(&self) -> (usize, usize, usize) {
        self.input
    }

    /// The `(channels, height, width)` of each output sample.
    pub fn output(&self) -> (usize, usize, usize) {
        let (c, h, w) = self.input;
        (c, h / self.window, w / self.window)
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn forward(&mut self, x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>> {
        let (c, h, w) = self.input;
        let (_, oh, ow) = self.output();
        let win = self.window;
        let kind = self.kind;

        if x.ncols() != c * h * w {
            return Err(MlErr::SizeMismatch {
                what: "pool input features",
                got: x.ncols(),
                expected: c * h * w,
            });
        }

        let shape = (x.nrows(), c * oh * ow);
        self.out.fit_shape(shape);
        self.argmax.fit_shape(shape);

        Zip::from(self.out.rows_mut())
            .and(self.argmax.rows_mut())
            .and(x.rows())
            .par_for_each(|mut out, mut argmax, x| {
                for ch in 0..c {
                    for oy in 0..oh {
                        for ox in 0..ow {
                            let o = (ch * oh + oy) * ow + ox;
                            let first = (ch * h + oy * win) * w + ox * win;

                            let mut sum = 0.0;
                            let mut best = x[first];
                            let mut best_at = first;

                            for ky in 0..win {
                                for kx in 0..win {
                                    let i = first + ky * w + kx;
                                    sum += x[i];
                                    if x[i] > best {
                                        best = x[i];
                                        best_at = i;
                                    }
                                }
                            }

                            out[o] = match kind {
                                PoolKind::Avg => sum / (win * win) as f32,
                                PoolKind::Max => best,
                            };
                            argmax[o] = best_at;
                        }
                    }
                }
            });

        Ok(self.out.view())
    }

    /// Routes the delta back to the input: spread evenly over the window for
    /// average pooling, or to the winning position for max pooling.
    pub fn backward(&mut self, d: ArrayViewMut2<f32>) -> Result<ArrayViewMut2<'_, f32>> {
        if d.dim() != self.out.dim() {
            return Err(MlErr::SizeMismatch {
                what: "pool delta",
                got: d.len(),
                expected: self.out.len(),
            });
        }

        let (c, h, w) = self.input;
        let (_, oh, ow) = self.output();
        let win = self.window;
        let kind = self.kind;
        let share = 1.0 / (win * win) as f32;

        self.d.fit_shape((d.nrows(), c * h * w));
        self.d.fill(0.0);

        Zip::from(self.d.rows_mut())
            .and(self.argmax.rows())
            .and(d.rows())
            .par_for_each(|mut dx, argmax, dy| match kind {
                PoolKind::Max => {
                    for (&at, &g) in argmax.iter().zip(dy) {
                        dx[at] += g;
                    }
                }
                PoolKind::Avg => {
                    for (o, &g) in dy.iter().enumerate() {
                        let ch = o / (oh * ow);
                        let oy = (o / ow) % oh;
                        let ox = o % ow;
                        let first = (ch * h + oy * win) * w + ox * win;

                        for ky in 0..win {
                            for kx in 0..win {
                                dx[first + ky * w + kx] += g * share;
                            }
                        }
                    }
                }
            });

        Ok(self.d.view_mut())
    }
}
