mod in_memory;
pub mod idx;
pub mod synthetic;

pub use in_memory::{Batch, Dataset};
pub use idx::{Split, load_mnist};
