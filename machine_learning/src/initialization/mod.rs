mod chained;
mod constant;
mod error;
mod param_gen;
mod random;
mod scheme;

pub use chained::ChainedParamGen;
pub use constant::ConstParamGen;
pub use error::RandErr;
pub use param_gen::ParamGen;
pub use random::RandParamGen;
pub use scheme::InitScheme;
