use std::{
    env, fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::info;
use machine_learning::{
    arch::layers::PoolKind,
    dataset::{Dataset, Split, load_mnist, synthetic},
    initialization::InitScheme,
    optimization::{Adam, GradientDescent, Optimizer},
};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    DpErr, Result,
    models::{CLASSES, IMAGE_SIDE},
};

const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(256).unwrap();
const DEFAULT_DEVICES: NonZeroUsize = NonZeroUsize::new(2).unwrap();

/// Where the training and test samples come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetConfig {
    /// MNIST or Fashion-MNIST IDX files in `dir`.
    Idx {
        dir: PathBuf,
        #[serde(default)]
        train_limit: Option<usize>,
        #[serde(default)]
        test_limit: Option<usize>,
    },
    /// Noisy class prototypes, for running without the real files.
    Synthetic {
        train_samples: usize,
        test_samples: usize,
        noise: f32,
    },
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self::Idx {
            dir: PathBuf::from("data/mnist"),
            train_limit: None,
            test_limit: None,
        }
    }
}

impl DatasetConfig {
    /// Loads the `(train, test)` datasets.
    pub fn load(&self, seed: u64) -> Result<(Dataset, Dataset)> {
        let (train, test) = match self {
            DatasetConfig::Idx {
                dir,
                train_limit,
                test_limit,
            } => {
                let mut train = load_mnist(dir, Split::Train)?;
                let mut test = load_mnist(dir, Split::Test)?;

                if let Some(n) = train_limit {
                    train.truncate(*n);
                }
                if let Some(n) = test_limit {
                    test.truncate(*n);
                }

                (train, test)
            }
            DatasetConfig::Synthetic {
                train_samples,
                test_samples,
                noise,
            } => {
                let mut rng = StdRng::seed_from_u64(seed);
                let all = synthetic::prototypes(
                    CLASSES,
                    IMAGE_SIDE * IMAGE_SIDE,
                    train_samples + test_samples,
                    *noise,
                    &mut rng,
                )?;

                all.split(*train_samples)?
            }
        };

        info!(
            "loaded {} training and {} test samples",
            train.len(),
            test.len()
        );
        Ok((train, test))
    }
}

/// The update rule every replica applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    #[default]
    GradientDescent,
    Adam {
        beta1: f32,
        beta2: f32,
    },
}

impl OptimizerConfig {
    pub fn build(&self, len: usize, learning_rate: f32) -> Box<dyn Optimizer> {
        match *self {
            OptimizerConfig::GradientDescent => Box::new(GradientDescent::new(learning_rate)),
            OptimizerConfig::Adam { beta1, beta2 } => {
                Box::new(Adam::new(len, learning_rate, beta1, beta2, 1e-8))
            }
        }
    }
}

/// The configuration of a data parallel training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    pub devices: NonZeroUsize,
    pub home_device: usize,
    pub batch_size: NonZeroUsize,
    pub learning_rate: f32,
    pub epochs: usize,
    pub seed: u64,
    pub pooling: PoolKind,
    pub init: InitScheme,
    pub optimizer: OptimizerConfig,
    pub drop_last: bool,
    pub dataset: DatasetConfig,
    pub checkpoint: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            devices: DEFAULT_DEVICES,
            home_device: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            learning_rate: 0.2,
            epochs: 10,
            seed: 42,
            pooling: PoolKind::Avg,
            init: InitScheme::Normal { std_dev: 0.01 },
            optimizer: OptimizerConfig::GradientDescent,
            drop_last: true,
            dataset: DatasetConfig::default(),
            checkpoint: None,
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| DpErr::InvalidConfig(format!("{name}={raw} can't be parsed"))),
        Err(_) => Ok(None),
    }
}

impl TrainingConfig {
    /// Reads a JSON config file, missing fields take their default values.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Overrides the most common knobs from `DP_DEVICES`, `DP_BATCH_SIZE`, `DP_EPOCHS`,
    /// `DP_LR`, `DP_SEED` and `DP_DATA_DIR`.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(devices) = parse_var("DP_DEVICES")? {
            self.devices = devices;
        }
        if let Some(batch_size) = parse_var("DP_BATCH_SIZE")? {
            self.batch_size = batch_size;
        }
        if let Some(epochs) = parse_var("DP_EPOCHS")? {
            self.epochs = epochs;
        }
        if let Some(lr) = parse_var("DP_LR")? {
            self.learning_rate = lr;
        }
        if let Some(seed) = parse_var("DP_SEED")? {
            self.seed = seed;
        }
        if let Some(dir) = parse_var::<PathBuf>("DP_DATA_DIR")? {
            self.dataset = DatasetConfig::Idx {
                dir,
                train_limit: None,
                test_limit: None,
            };
        }

        Ok(self)
    }

    /// Checks the config describes a run that can start.
    pub fn validate(&self) -> Result<()> {
        let devices = self.devices.get();
        let batch_size = self.batch_size.get();

        if !batch_size.is_multiple_of(devices) {
            return Err(DpErr::IndivisibleBatch {
                batch_size,
                devices,
            });
        }

        if self.home_device >= devices {
            return Err(DpErr::InvalidHome {
                home: self.home_device,
                devices,
            });
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(DpErr::InvalidConfig(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }

        self.init
            .validate()
            .map_err(|e| DpErr::InvalidConfig(format!("invalid init scheme: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{ "devices": 4, "pooling": "max" }"#).unwrap();

        assert_eq!(config.devices.get(), 4);
        assert_eq!(config.pooling, PoolKind::Max);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert!(config.drop_last);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: std::result::Result<TrainingConfig, _> =
            serde_json::from_str(r#"{ "device": 4 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn zero_devices_are_rejected() {
        let result: std::result::Result<TrainingConfig, _> =
            serde_json::from_str(r#"{ "devices": 0 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn batch_must_split_across_devices() {
        let config = TrainingConfig {
            devices: NonZeroUsize::new(3).unwrap(),
            ..Default::default()
        };

        assert!(matches!(
            config.validate(),
            Err(DpErr::IndivisibleBatch {
                batch_size: 256,
                devices: 3
            })
        ));
        assert!(TrainingConfig::default().validate().is_ok());
    }

    #[test]
    fn synthetic_dataset_splits_train_and_test() {
        let config = DatasetConfig::Synthetic {
            train_samples: 12,
            test_samples: 4,
            noise: 0.1,
        };

        let (train, test) = config.load(0).unwrap();
        assert_eq!((train.len(), test.len()), (12, 4));
        assert_eq!(train.x_size(), 784);
    }

    #[test]
    fn tagged_dataset_config() {
        let config: DatasetConfig =
            serde_json::from_str(r#"{ "kind": "idx", "dir": "/data/fashion" }"#).unwrap();
        assert_eq!(
            config,
            DatasetConfig::Idx {
                dir: PathBuf::from("/data/fashion"),
                train_limit: None,
                test_limit: None
            }
        );
    }

    #[test]
    fn negative_init_std_dev_is_rejected() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{ "init": { "kind": "normal", "std_dev": -1.0 } }"#).unwrap();
        assert!(matches!(config.validate(), Err(DpErr::InvalidConfig(_))));
    }
}
