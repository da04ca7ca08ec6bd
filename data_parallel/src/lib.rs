//! Manual data parallelism: every batch is partitioned across a fixed set of devices, each
//! device computes the gradient of its shard on its own replica, the gradients are summed
//! with an all-reduce and every replica applies the same update.

pub mod all_reduce;
pub mod config;
pub mod device;
pub mod error;
pub mod models;
pub mod partition;
pub mod stats;
pub mod trainer;

pub use all_reduce::{all_reduce, sum_into};
pub use config::TrainingConfig;
pub use error::{DpErr, Result};
pub use partition::{Shard, partition};
pub use stats::{EpochStats, StepStats};
pub use trainer::DataParallelTrainer;
