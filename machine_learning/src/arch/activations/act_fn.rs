use super::{LeakyRelu, Relu, Sigmoid, Tanh};

/// An element-wise activation function applied at the output of a layer.
#[derive(Clone, Debug)]
pub enum ActFn {
    Sigmoid(Sigmoid),
    Relu(Relu),
    LeakyRelu(LeakyRelu),
    Tanh(Tanh),
}

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        Self::Sigmoid(Sigmoid::new(amp))
    }

    pub fn relu() -> Self {
        Self::Relu(Relu)
    }

    pub fn leaky_relu(alpha: f32) -> Self {
        Self::LeakyRelu(LeakyRelu::new(alpha))
    }

    pub fn tanh() -> Self {
        Self::Tanh(Tanh)
    }

    /// Evaluates the function at `z`.
    pub fn f(&self, z: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.f(z),
            Self::Relu(a) => a.f(z),
            Self::LeakyRelu(a) => a.f(z),
            Self::Tanh(a) => a.f(z),
        }
    }

    /// Evaluates the derivative of the function at `z`.
    pub fn df(&self, z: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.df(z),
            Self::Relu(a) => a.df(z),
            Self::LeakyRelu(a) => a.df(z),
            Self::Tanh(a) => a.df(z),
        }
    }
}
