pub mod activations;
pub mod layers;
pub mod loss;
mod layout;
mod metrics;
mod model;
mod sequential;

pub use layout::ParamTensor;
pub use metrics::count_correct;
pub use model::Model;
pub use sequential::Sequential;
