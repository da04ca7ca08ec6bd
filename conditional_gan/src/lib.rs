//! A conditional GAN for 28x28 digits: the generator maps latent noise plus a one-hot label to
//! an image in `[-1, 1]`, the discriminator scores an image plus its label.

pub mod config;
pub mod error;
mod gan;
pub mod grid;
mod network;

pub use config::GanConfig;
pub use error::{GanErr, Result};
pub use gan::{ConditionalGan, Dims, GanStats, one_hot};
