use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::Dataset;
use crate::Result;

/// Generates a labelled dataset of noisy copies of one random prototype per class.
///
/// Every sample is its class prototype plus `N(0, noise²)` per feature, clamped into `[0, 1]`,
/// which gives a stand-in for an image dataset that a small model can learn quickly.
///
/// # Arguments
/// * `classes` - The amount of classes, also the width of the one-hot targets.
/// * `features` - The amount of features of each sample.
/// * `samples` - The amount of samples, assigned to classes round robin.
/// * `noise` - The standard deviation of the per-feature noise.
/// * `rng` - The random source.
pub fn prototypes<R: Rng + ?Sized>(
    classes: usize,
    features: usize,
    samples: usize,
    noise: f32,
    rng: &mut R,
) -> Result<Dataset> {
    let unit = Uniform::new_inclusive(0.0f32, 1.0).map_err(crate::initialization::RandErr::from)?;
    let jitter = Normal::new(0.0f32, noise).map_err(crate::initialization::RandErr::from)?;

    let protos = Array2::from_shape_simple_fn((classes, features), || unit.sample(rng));

    let mut x = Array2::zeros((samples, features));
    let mut y = Array2::zeros((samples, classes));

    for (i, mut row) in x.rows_mut().into_iter().enumerate() {
        let class = i % classes;
        y[[i, class]] = 1.0;

        for (v, &p) in row.iter_mut().zip(protos.row(class)) {
            *v = (p + jitter.sample(rng)).clamp(0.0, 1.0);
        }
    }

    Dataset::new(x, y)
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn labels_are_round_robin_one_hot() {
        let mut rng = StdRng::seed_from_u64(0);
        let dataset = prototypes(3, 16, 7, 0.1, &mut rng).unwrap();

        assert_eq!(dataset.len(), 7);
        assert_eq!(dataset.y().sum(), 7.0);
        assert_eq!(dataset.y()[[4, 1]], 1.0);
        assert!(dataset.x().iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
