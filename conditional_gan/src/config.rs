use std::{
    env, fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
};

use machine_learning::initialization::InitScheme;
use serde::{Deserialize, Serialize};

use crate::{GanErr, Result, gan::Dims};

const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(64).unwrap();
const DEFAULT_LATENT: NonZeroUsize = NonZeroUsize::new(100).unwrap();
const DEFAULT_HIDDEN: NonZeroUsize = NonZeroUsize::new(256).unwrap();

/// The configuration of a conditional GAN training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GanConfig {
    pub latent_dim: NonZeroUsize,
    pub hidden: NonZeroUsize,
    pub batch_size: NonZeroUsize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub beta1: f32,
    pub seed: u64,
    pub init: InitScheme,
    /// A directory with MNIST style IDX files.
    pub data_dir: PathBuf,
    pub train_limit: Option<usize>,
    /// Images of each digit in the final grid.
    pub samples_per_class: usize,
    /// Where the grid and the checkpoints are written.
    pub output_dir: PathBuf,
}

impl Default for GanConfig {
    fn default() -> Self {
        Self {
            latent_dim: DEFAULT_LATENT,
            hidden: DEFAULT_HIDDEN,
            batch_size: DEFAULT_BATCH_SIZE,
            epochs: 20,
            learning_rate: 2e-4,
            beta1: 0.5,
            seed: 42,
            init: InitScheme::Xavier,
            data_dir: PathBuf::from("data/mnist"),
            train_limit: None,
            samples_per_class: 8,
            output_dir: PathBuf::from("gan_out"),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| GanErr::InvalidConfig(format!("{name}={raw} can't be parsed"))),
        Err(_) => Ok(None),
    }
}

impl GanConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Overrides `GAN_EPOCHS`, `GAN_BATCH_SIZE`, `GAN_LR`, `GAN_SEED`, `GAN_DATA_DIR` and
    /// `GAN_OUTPUT_DIR` when set.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(epochs) = parse_var("GAN_EPOCHS")? {
            self.epochs = epochs;
        }
        if let Some(batch_size) = parse_var("GAN_BATCH_SIZE")? {
            self.batch_size = batch_size;
        }
        if let Some(lr) = parse_var("GAN_LR")? {
            self.learning_rate = lr;
        }
        if let Some(seed) = parse_var("GAN_SEED")? {
            self.seed = seed;
        }
        if let Some(dir) = parse_var("GAN_DATA_DIR")? {
            self.data_dir = dir;
        }
        if let Some(dir) = parse_var("GAN_OUTPUT_DIR")? {
            self.output_dir = dir;
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(GanErr::InvalidConfig(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }

        if !(0.0..1.0).contains(&self.beta1) {
            return Err(GanErr::InvalidConfig(format!(
                "beta1 must be in [0, 1), got {}",
                self.beta1
            )));
        }

        self.init
            .validate()
            .map_err(|e| GanErr::InvalidConfig(format!("invalid init scheme: {e}")))?;

        Ok(())
    }

    /// The network sizes for 28x28 digits.
    pub fn dims(&self) -> Dims {
        Dims {
            latent: self.latent_dim.get(),
            hidden: self.hidden.get(),
            ..Dims::mnist()
        }
    }
}
