use std::ops::Range;

/// A named tensor inside a model's flat parameter vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub offset: usize,
}

impl ParamTensor {
    pub fn new(name: String, shape: Vec<usize>, offset: usize) -> Self {
        Self {
            name,
            shape,
            offset,
        }
    }

    /// The amount of scalars in the tensor.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The range this tensor occupies in the flat parameter vector.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len()
    }

    pub fn is_bias(&self) -> bool {
        self.name.ends_with(".bias")
    }

    /// The amount of inputs feeding each output unit, used by scaled initializers.
    pub fn fan_in(&self) -> usize {
        match self.shape.as_slice() {
            [n_in, _] => *n_in,
            [_, rest @ ..] => rest.iter().product(),
            [] => 0,
        }
    }

    /// The amount of output units each input feeds, used by scaled initializers.
    pub fn fan_out(&self) -> usize {
        match self.shape.as_slice() {
            [_, n_out] => *n_out,
            [filters, _, spatial @ ..] => filters * spatial.iter().product::<usize>(),
            [n] => *n,
            [] => 0,
        }
    }
}
