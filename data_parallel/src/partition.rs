use machine_learning::MlErr;
use ndarray::{Array2, ArrayView2, Axis};

use crate::{DpErr, Result};

/// The contiguous slice of a batch assigned to one device.
#[derive(Debug, Clone, PartialEq)]
pub struct Shard {
    pub x: Array2<f32>,
    pub y: Array2<f32>,
}

impl Shard {
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits a batch into `k` equally sized, contiguous shards in device order.
///
/// # Arguments
/// * `x` - The batch inputs, one sample per row.
/// * `y` - The batch targets, one sample per row.
/// * `k` - The amount of devices.
///
/// # Returns
/// The `k` shards, whose concatenation is the original batch, or `IndivisibleBatch` if the
/// amount of samples isn't a multiple of `k`.
pub fn partition(x: ArrayView2<f32>, y: ArrayView2<f32>, k: usize) -> Result<Vec<Shard>> {
    if k == 0 {
        return Err(DpErr::NoDevices);
    }

    let n = x.nrows();

    if y.nrows() != n {
        return Err(MlErr::SizeMismatch {
            what: "batch targets",
            got: y.nrows(),
            expected: n,
        }
        .into());
    }

    if !n.is_multiple_of(k) {
        return Err(DpErr::IndivisibleBatch {
            batch_size: n,
            devices: k,
        });
    }

    if n == 0 {
        let shard = Shard {
            x: Array2::zeros((0, x.ncols())),
            y: Array2::zeros((0, y.ncols())),
        };
        return Ok(vec![shard; k]);
    }

    let per_device = n / k;
    let shards = x
        .axis_chunks_iter(Axis(0), per_device)
        .zip(y.axis_chunks_iter(Axis(0), per_device))
        .map(|(x, y)| Shard {
            x: x.to_owned(),
            y: y.to_owned(),
        })
        .collect();

    Ok(shards)
}
