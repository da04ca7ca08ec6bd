//! Writing generated images as a binary PGM grid.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use log::info;
use machine_learning::MlErr;
use ndarray::ArrayView2;

use crate::Result;

/// Maps a value in `[-1, 1]` to a gray level.
fn gray(v: f32) -> u8 {
    ((v + 1.) * 127.5).round().clamp(0., 255.) as u8
}

/// Writes square images as a grid with `columns` images per row.
///
/// # Arguments
/// * `path` - Where to write the `.pgm` file.
/// * `images` - One `side × side` image per row, with values in `[-1, 1]`.
/// * `side` - The side of each image in pixels.
/// * `columns` - The amount of images per grid row, the last row is padded with black.
pub fn write_pgm(path: &Path, images: ArrayView2<f32>, side: usize, columns: usize) -> Result<()> {
    if images.ncols() != side * side {
        return Err(MlErr::SizeMismatch {
            what: "grid image pixels",
            got: images.ncols(),
            expected: side * side,
        }
        .into());
    }

    let columns = columns.max(1);
    let rows = images.nrows().div_ceil(columns);
    let (width, height) = (columns * side, rows * side);

    let mut pixels = vec![0u8; width * height];
    for (i, image) in images.rows().into_iter().enumerate() {
        let (top, left) = ((i / columns) * side, (i % columns) * side);

        for (p, &v) in image.iter().enumerate() {
            let (y, x) = (p / side, p % side);
            pixels[(top + y) * width + left + x] = gray(v);
        }
    }

    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "P5\n{width} {height}\n255\n")?;
    out.write_all(&pixels)?;
    out.flush()?;

    info!("wrote a {columns}x{rows} image grid to {}", path.display());
    Ok(())
}
