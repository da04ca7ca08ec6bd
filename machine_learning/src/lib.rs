//! A small neural network library: layers with hand-written backward passes over flat
//! parameter vectors, losses, optimizers, initializers, datasets and checkpoints.

pub mod arch;
pub mod checkpoint;
pub mod dataset;
pub mod error;
pub mod initialization;
pub mod optimization;

pub use error::{MlErr, Result};
