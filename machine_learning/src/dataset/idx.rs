use std::{fs, path::Path};

use log::debug;
use ndarray::Array2;

use super::Dataset;
use crate::{MlErr, Result};

const IMAGES_MAGIC: u32 = 0x0000_0803;
const LABELS_MAGIC: u32 = 0x0000_0801;

/// Which half of an MNIST-style dataset to load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    fn prefix(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "t10k",
        }
    }
}

fn invalid(path: &Path, reason: impl Into<String>) -> MlErr {
    MlErr::InvalidIdx {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn read_u32(path: &Path, bytes: &[u8], at: usize) -> Result<u32> {
    let word = bytes
        .get(at..at + 4)
        .ok_or_else(|| invalid(path, "truncated header"))?;
    Ok(u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
}

/// Reads an uncompressed IDX3 image file, scaling pixels into `[0, 1]`.
///
/// # Returns
/// One flattened image per row, along with the `(rows, cols)` of each image.
pub fn read_images(path: &Path) -> Result<(Array2<f32>, (usize, usize))> {
    let bytes = fs::read(path)?;

    let magic = read_u32(path, &bytes, 0)?;
    if magic != IMAGES_MAGIC {
        return Err(invalid(path, format!("bad magic {magic:#010x} for images")));
    }

    let n = read_u32(path, &bytes, 4)? as usize;
    let rows = read_u32(path, &bytes, 8)? as usize;
    let cols = read_u32(path, &bytes, 12)? as usize;
    let pixels = &bytes[16..];

    let (image_len, total) = rows
        .checked_mul(cols)
        .and_then(|image_len| Some((image_len, image_len.checked_mul(n)?)))
        .ok_or_else(|| invalid(path, format!("header dims {n}x{rows}x{cols} overflow")))?;

    if pixels.len() != total {
        return Err(invalid(
            path,
            format!("expected {total} pixels, found {}", pixels.len()),
        ));
    }

    let data = pixels.iter().map(|&p| p as f32 / 255.0).collect();
    let images = Array2::from_shape_vec((n, image_len), data)?;

    debug!("read {n} {rows}x{cols} images from {}", path.display());
    Ok((images, (rows, cols)))
}

/// Reads an uncompressed IDX1 label file as one-hot rows of `classes` columns.
pub fn read_labels(path: &Path, classes: usize) -> Result<Array2<f32>> {
    let bytes = fs::read(path)?;

    let magic = read_u32(path, &bytes, 0)?;
    if magic != LABELS_MAGIC {
        return Err(invalid(path, format!("bad magic {magic:#010x} for labels")));
    }

    let n = read_u32(path, &bytes, 4)? as usize;
    let labels = &bytes[8..];

    if labels.len() != n {
        return Err(invalid(path, format!("expected {n} labels, found {}", labels.len())));
    }

    let mut one_hot = Array2::zeros((n, classes));
    for (i, &label) in labels.iter().enumerate() {
        let label = label as usize;
        if label >= classes {
            return Err(invalid(path, format!("label {label} out of {classes} classes")));
        }
        one_hot[[i, label]] = 1.0;
    }

    debug!("read {n} labels from {}", path.display());
    Ok(one_hot)
}

/// Loads `{train,t10k}-images-idx3-ubyte` and `{train,t10k}-labels-idx1-ubyte` from `dir`.
///
/// Works for both MNIST and Fashion-MNIST, which share the file format and names.
pub fn load_mnist(dir: &Path, split: Split) -> Result<Dataset> {
    let prefix = split.prefix();
    let (x, _) = read_images(&dir.join(format!("{prefix}-images-idx3-ubyte")))?;
    let y = read_labels(&dir.join(format!("{prefix}-labels-idx1-ubyte")), 10)?;
    Dataset::new(x, y)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn header(magic: u32, dims: &[u32]) -> Vec<u8> {
        std::iter::once(magic)
            .chain(dims.iter().copied())
            .flat_map(u32::to_be_bytes)
            .collect()
    }

    fn write(dir: &Path, name: &str, bytes: &[u8]) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        file.write_all(bytes).unwrap();
    }

    #[test]
    fn loads_images_and_one_hot_labels() {
        let dir = tempfile::tempdir().unwrap();

        let mut images = header(IMAGES_MAGIC, &[2, 2, 2]);
        images.extend([0, 255, 51, 102, 255, 0, 0, 0]);
        write(dir.path(), "t10k-images-idx3-ubyte", &images);

        let mut labels = header(LABELS_MAGIC, &[2]);
        labels.extend([7, 1]);
        write(dir.path(), "t10k-labels-idx1-ubyte", &labels);

        let dataset = load_mnist(dir.path(), Split::Test).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.x_size(), 4);
        assert_eq!(dataset.x()[[0, 1]], 1.0);
        assert!((dataset.x()[[0, 2]] - 0.2).abs() < 1e-6);
        assert_eq!(dataset.y()[[0, 7]], 1.0);
        assert_eq!(dataset.y()[[1, 1]], 1.0);
        assert_eq!(dataset.y().sum(), 2.0);
    }

    #[test]
    fn rejects_wrong_magic() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "labels", &header(IMAGES_MAGIC, &[0]));

        let err = read_labels(&dir.path().join("labels"), 10).unwrap_err();
        assert!(matches!(err, MlErr::InvalidIdx { .. }));
    }

    #[test]
    fn rejects_truncated_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let mut images = header(IMAGES_MAGIC, &[1, 2, 2]);
        images.extend([1, 2, 3]);
        write(dir.path(), "images", &images);

        assert!(read_images(&dir.path().join("images")).is_err());
    }

    #[test]
    fn rejects_overflowing_dims() {
        let dir = tempfile::tempdir().unwrap();
        let images = header(IMAGES_MAGIC, &[u32::MAX, u32::MAX, u32::MAX]);
        write(dir.path(), "huge", &images);

        let err = read_images(&dir.path().join("huge")).unwrap_err();
        assert!(matches!(err, MlErr::InvalidIdx { .. }), "{err}");
    }
}
