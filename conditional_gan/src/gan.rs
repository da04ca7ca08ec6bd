use std::{cell::RefCell, path::Path, rc::Rc};

use log::debug;
use machine_learning::{
    MlErr,
    arch::{
        Sequential,
        activations::ActFn,
        layers::Layer,
        loss::{BinaryCrossEntropy, LossFn},
    },
    initialization::InitScheme,
};
use ndarray::{Array2, ArrayView2, Axis, concatenate, s};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, StandardNormal};

use crate::{GanErr, Result, network::Network};

const LEAKY_SLOPE: f32 = 0.2;
const GENERATOR_FILE: &str = "generator.safetensors";
const DISCRIMINATOR_FILE: &str = "discriminator.safetensors";

/// The sizes of both networks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dims {
    pub latent: usize,
    pub hidden: usize,
    pub image: usize,
    pub classes: usize,
}

impl Dims {
    /// 100 latent dimensions, 256 hidden units, 28x28 images and 10 digits.
    pub fn mnist() -> Self {
        Self {
            latent: 100,
            hidden: 256,
            image: 28 * 28,
            classes: 10,
        }
    }
}

/// The mean binary cross-entropy per sample of each network during one step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GanStats {
    pub d_loss: f32,
    pub g_loss: f32,
}

/// One-hot encodes `labels` into a `labels.len() × classes` matrix.
pub fn one_hot(labels: &[usize], classes: usize) -> Result<Array2<f32>> {
    let mut encoded = Array2::zeros((labels.len(), classes));

    for (i, &label) in labels.iter().enumerate() {
        if label >= classes {
            return Err(GanErr::InvalidLabel { label, classes });
        }
        encoded[[i, label]] = 1.;
    }

    Ok(encoded)
}

/// A label conditioned generator and discriminator trained against each other.
pub struct ConditionalGan {
    dims: Dims,
    generator: Network,
    discriminator: Network,
    loss_fn: BinaryCrossEntropy,
}

impl ConditionalGan {
    /// Creates a new `ConditionalGan` with freshly initialized networks.
    ///
    /// # Arguments
    /// * `dims` - The sizes of both networks.
    /// * `init` - How the weights are drawn, biases start at zero.
    /// * `learning_rate`, `beta1` - The Adam hyperparameters both networks train with.
    /// * `seed` - Makes the initial weights reproducible.
    pub fn new(
        dims: Dims,
        init: InitScheme,
        learning_rate: f32,
        beta1: f32,
        seed: u64,
    ) -> Result<Self> {
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(seed)));
        let leaky = || Some(ActFn::leaky_relu(LEAKY_SLOPE));

        let generator = Sequential::new([
            Layer::dense((dims.latent + dims.classes, dims.hidden), leaky()),
            Layer::dense((dims.hidden, dims.image), Some(ActFn::tanh())),
        ]);
        let discriminator = Sequential::new([
            Layer::dense((dims.image + dims.classes, dims.hidden), leaky()),
            Layer::dense((dims.hidden, 1), None),
        ]);

        Ok(Self {
            dims,
            generator: Network::new(generator, init, rng.clone(), learning_rate, beta1)?,
            discriminator: Network::new(discriminator, init, rng, learning_rate, beta1)?,
            loss_fn: BinaryCrossEntropy,
        })
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn generator_params(&self) -> &[f32] {
        self.generator.params()
    }

    pub fn discriminator_params(&self) -> &[f32] {
        self.discriminator.params()
    }

    /// Trains both networks on one batch.
    ///
    /// The discriminator first learns to tell the real images (target 1) from freshly generated
    /// ones (target 0). Then the generator learns to make the updated discriminator answer 1
    /// for its images, with the discriminator's parameters left as they are.
    ///
    /// # Arguments
    /// * `images` - Real images scaled to `[-1, 1]`, one per row.
    /// * `labels` - The one-hot label of each image.
    /// * `rng` - The source of latent noise.
    pub fn train_step<R: Rng + ?Sized>(
        &mut self,
        images: ArrayView2<f32>,
        labels: ArrayView2<f32>,
        rng: &mut R,
    ) -> Result<GanStats> {
        self.check_batch(images, labels)?;

        let n = images.nrows();
        if n == 0 {
            return Ok(GanStats::default());
        }

        // discriminator, on real and fake samples at once
        let fake = self.generate_from(labels, rng)?;
        let real_in = concatenate(Axis(1), &[images, labels])?;
        let fake_in = concatenate(Axis(1), &[fake.view(), labels])?;
        let d_in = concatenate(Axis(0), &[real_in.view(), fake_in.view()])?;
        let targets = concatenate(
            Axis(0),
            &[Array2::<f32>::ones((n, 1)).view(), Array2::<f32>::zeros((n, 1)).view()],
        )?;

        let logits = self.discriminator.forward(&d_in)?;
        let d_loss = self.loss_fn.loss(logits.view(), targets.view());
        let d = self.loss_fn.loss_prime(logits.view(), targets.view());
        self.discriminator.backward(d)?;
        self.discriminator.update(2 * n)?;

        // generator, through the discriminator
        let z = self.latent(n, rng);
        let g_in = concatenate(Axis(1), &[z.view(), labels])?;
        let fake = self.generator.forward(&g_in)?;
        let fake_in = concatenate(Axis(1), &[fake.view(), labels])?;
        let fooled = Array2::<f32>::ones((n, 1));

        let logits = self.discriminator.forward(&fake_in)?;
        let g_loss = self.loss_fn.loss(logits.view(), fooled.view());
        let d = self.loss_fn.loss_prime(logits.view(), fooled.view());
        let d_fake_in = self.discriminator.backward(d)?;
        let d_fake = d_fake_in.slice(s![.., ..self.dims.image]).to_owned();
        self.generator.backward(d_fake)?;
        self.generator.update(n)?;

        let stats = GanStats {
            d_loss: d_loss / (2 * n) as f32,
            g_loss: g_loss / n as f32,
        };
        debug!(d_loss = stats.d_loss, g_loss = stats.g_loss; "gan step over {n} samples");
        Ok(stats)
    }

    /// Generates one image in `[-1, 1]` per requested digit.
    pub fn generate<R: Rng + ?Sized>(
        &mut self,
        labels: &[usize],
        rng: &mut R,
    ) -> Result<Array2<f32>> {
        let labels = one_hot(labels, self.dims.classes)?;
        self.generate_from(labels.view(), rng)
    }

    /// Generates `per_class` images of every digit, grouped by digit.
    pub fn class_grid<R: Rng + ?Sized>(
        &mut self,
        per_class: usize,
        rng: &mut R,
    ) -> Result<Array2<f32>> {
        let labels: Vec<usize> = (0..self.dims.classes)
            .flat_map(|class| std::iter::repeat_n(class, per_class))
            .collect();
        self.generate(&labels, rng)
    }

    /// Writes both networks' parameters as safetensors files in `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        self.generator.save(&dir.join(GENERATOR_FILE))?;
        self.discriminator.save(&dir.join(DISCRIMINATOR_FILE))
    }

    /// Restores both networks from files written by `save`. The optimizer state starts over.
    pub fn load(&mut self, dir: &Path) -> Result<()> {
        self.generator.load(&dir.join(GENERATOR_FILE))?;
        self.discriminator.load(&dir.join(DISCRIMINATOR_FILE))
    }

    fn generate_from<R: Rng + ?Sized>(
        &mut self,
        labels: ArrayView2<f32>,
        rng: &mut R,
    ) -> Result<Array2<f32>> {
        let z = self.latent(labels.nrows(), rng);
        let g_in = concatenate(Axis(1), &[z.view(), labels])?;
        self.generator.forward(&g_in)
    }

    fn latent<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Array2<f32> {
        Array2::from_shape_simple_fn((n, self.dims.latent), || StandardNormal.sample(rng))
    }

    fn check_batch(&self, images: ArrayView2<f32>, labels: ArrayView2<f32>) -> Result<()> {
        let checks = [
            ("gan image features", images.ncols(), self.dims.image),
            ("gan label classes", labels.ncols(), self.dims.classes),
            ("gan labels", labels.nrows(), images.nrows()),
        ];

        for (what, got, expected) in checks {
            if got != expected {
                return Err(MlErr::SizeMismatch {
                    what,
                    got,
                    expected,
                }
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_hot_rejects_unknown_digits() {
        assert_eq!(
            one_hot(&[2, 0], 3).unwrap(),
            ndarray::array![[0., 0., 1.], [1., 0., 0.]]
        );
        assert!(matches!(
            one_hot(&[10], 10),
            Err(GanErr::InvalidLabel {
                label: 10,
                classes: 10
            })
        ));
    }

    #[test]
    fn same_seed_same_networks() {
        let build =
            || ConditionalGan::new(Dims::mnist(), InitScheme::Xavier, 2e-4, 0.5, 3).unwrap();
        let (a, b) = (build(), build());

        assert_eq!(a.generator_params(), b.generator_params());
        assert_eq!(a.discriminator_params(), b.discriminator_params());
        assert_eq!(a.generator_params().len(), (110 + 1) * 256 + 257 * 784);
    }
}
