use ndarray::{Array2, ArrayView2, Axis, s};
use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// An in-memory supervised dataset: one sample per row of `x`, its target in the same row of `y`.
#[derive(Clone, Debug)]
pub struct Dataset {
    x: Array2<f32>,
    y: Array2<f32>,
    order: Vec<usize>,
}

/// An owned slice of a dataset, ready to be moved to another thread.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub x: Array2<f32>,
    pub y: Array2<f32>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Returns
    /// An error if `x` and `y` have a different amount of rows.
    pub fn new(x: Array2<f32>, y: Array2<f32>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "dataset targets",
                got: y.nrows(),
                expected: x.nrows(),
            });
        }

        let order = (0..x.nrows()).collect();
        Ok(Self { x, y, order })
    }

    /// Builds a dataset out of a flat buffer where every row is `x_size` inputs followed by
    /// `y_size` targets.
    pub fn from_flat(data: Vec<f32>, x_size: usize, y_size: usize) -> Result<Self> {
        let row = x_size + y_size;

        if row == 0 || !data.len().is_multiple_of(row) {
            return Err(MlErr::SizeMismatch {
                what: "flat dataset",
                got: data.len(),
                expected: data.len().next_multiple_of(row.max(1)),
            });
        }

        let full = Array2::from_shape_vec((data.len() / row, row), data)?;
        let x = full.slice(s![.., ..x_size]).to_owned();
        let y = full.slice(s![.., x_size..]).to_owned();
        Self::new(x, y)
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn x_size(&self) -> usize {
        self.x.ncols()
    }

    pub fn y_size(&self) -> usize {
        self.y.ncols()
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView2<'_, f32> {
        self.y.view()
    }

    /// Keeps only the first `n` samples.
    pub fn truncate(&mut self, n: usize) {
        if n >= self.len() {
            return;
        }

        self.x = self.x.slice(s![..n, ..]).to_owned();
        self.y = self.y.slice(s![..n, ..]).to_owned();
        self.order = (0..n).collect();
    }

    /// Splits the dataset into its first `n` samples and the rest.
    pub fn split(self, n: usize) -> Result<(Self, Self)> {
        let n = n.min(self.len());
        let head = Self::new(
            self.x.slice(s![..n, ..]).to_owned(),
            self.y.slice(s![..n, ..]).to_owned(),
        )?;
        let tail = Self::new(
            self.x.slice(s![n.., ..]).to_owned(),
            self.y.slice(s![n.., ..]).to_owned(),
        )?;

        Ok((head, tail))
    }

    /// Linearly maps inputs from `[0, 1]` into `[low, high]`.
    pub fn rescale(&mut self, low: f32, high: f32) {
        let span = high - low;
        self.x.mapv_inplace(|v| low + v * span);
    }

    /// Shuffles the order in which `batches` visits the samples.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.order.shuffle(rng);
    }

    /// Restores the original sample order.
    pub fn unshuffle(&mut self) {
        self.order.sort_unstable();
    }

    /// Iterates over the dataset in batches of `batch_size` samples.
    ///
    /// # Arguments
    /// * `batch_size` - The amount of samples per batch.
    /// * `drop_last` - Whether to skip the trailing batch when it's smaller than `batch_size`.
    ///
    /// # Panics
    /// If `batch_size` is 0.
    pub fn batches(&self, batch_size: usize, drop_last: bool) -> impl Iterator<Item = Batch> + '_ {
        self.order
            .chunks(batch_size)
            .filter(move |idx| !drop_last || idx.len() == batch_size)
            .map(|idx| Batch {
                x: self.x.select(Axis(0), idx),
                y: self.y.select(Axis(0), idx),
            })
    }

    /// The amount of batches `batches` yields.
    pub fn num_batches(&self, batch_size: usize, drop_last: bool) -> usize {
        if drop_last {
            self.len() / batch_size
        } else {
            self.len().div_ceil(batch_size)
        }
    }
}
