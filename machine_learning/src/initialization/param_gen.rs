/// A `ParamGen` generates values for the initial state of a model's parameters.
pub trait ParamGen {
    /// Samples at most `n` parameters.
    ///
    /// # Returns
    /// `None` once the generator is exhausted.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;
}
