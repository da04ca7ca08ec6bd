use std::{cell::RefCell, rc::Rc};

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::{ParamGen, RandErr};
use crate::arch::ParamTensor;

/// A parameter generator that draws one tensor's worth of values from a distribution.
///
/// The rng is shared so that every tensor of a model is drawn from the same seeded stream.
pub struct RandParamGen<R: Rng, D: Distribution<f32>> {
    rng: Rc<RefCell<R>>,
    distribution: D,
    remaining: usize,
}

impl<R: Rng, D: Distribution<f32>> RandParamGen<R, D> {
    pub fn new(rng: Rc<RefCell<R>>, distribution: D, limit: usize) -> Self {
        Self {
            rng,
            distribution,
            remaining: limit,
        }
    }
}

impl<R: Rng> RandParamGen<R, Uniform<f32>> {
    /// Samples `tensor` uniformly from `[low, high)`.
    ///
    /// # Returns
    /// An error if the range is empty.
    pub fn uniform(
        rng: Rc<RefCell<R>>,
        tensor: &ParamTensor,
        low: f32,
        high: f32,
    ) -> Result<Self, RandErr> {
        Ok(Self::new(rng, Uniform::new(low, high)?, tensor.len()))
    }

    /// Xavier (Glorot) uniform initialization.
    pub fn xavier(rng: Rc<RefCell<R>>, tensor: &ParamTensor) -> Result<Self, RandErr> {
        let range = (6. / (tensor.fan_in() + tensor.fan_out()) as f32).sqrt();
        Self::uniform(rng, tensor, -range, range)
    }
}

impl<R: Rng> RandParamGen<R, Normal<f32>> {
    /// Samples `tensor` from `N(mean, std_dev²)`.
    ///
    /// # Returns
    /// An error if `std_dev` is negative or not finite.
    pub fn normal(
        rng: Rc<RefCell<R>>,
        tensor: &ParamTensor,
        mean: f32,
        std_dev: f32,
    ) -> Result<Self, RandErr> {
        // rand_distr only rejects a non-finite deviation
        if std_dev < 0. {
            return Err(RandErr::new(format!(
                "standard deviation must be non-negative, got {std_dev}"
            )));
        }

        Ok(Self::new(rng, Normal::new(mean, std_dev)?, tensor.len()))
    }

    /// Kaiming (He) normal initialization, suited to ReLU layers.
    pub fn kaiming(rng: Rc<RefCell<R>>, tensor: &ParamTensor) -> Result<Self, RandErr> {
        let std_dev = (2. / tensor.fan_in() as f32).sqrt();
        Self::normal(rng, tensor, 0., std_dev)
    }

    /// LeCun normal initialization.
    pub fn lecun(rng: Rc<RefCell<R>>, tensor: &ParamTensor) -> Result<Self, RandErr> {
        let std_dev = (1. / tensor.fan_in() as f32).sqrt();
        Self::normal(rng, tensor, 0., std_dev)
    }
}

impl<R: Rng, D: Distribution<f32>> ParamGen for RandParamGen<R, D> {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        if self.remaining == 0 {
            return None;
        }

        let n = n.min(self.remaining);
        self.remaining -= n;

        let mut rng = self.rng.borrow_mut();
        let rng = &mut *rng;
        Some((0..n).map(|_| self.distribution.sample(rng)).collect())
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn seeded_rng() -> Rc<RefCell<StdRng>> {
        Rc::new(RefCell::new(StdRng::seed_from_u64(42)))
    }

    fn tensor(shape: Vec<usize>) -> ParamTensor {
        ParamTensor::new("layer0.weight".into(), shape, 0)
    }

    #[test]
    fn generates_exactly_the_tensor() {
        let t = tensor(vec![3, 4]);
        let mut param_gen = RandParamGen::normal(seeded_rng(), &t, 0., 1.).unwrap();

        assert_eq!(param_gen.sample(7).unwrap().len(), 7);
        assert_eq!(param_gen.sample(7).unwrap().len(), 5);
        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn xavier_stays_in_range() {
        let t = tensor(vec![10, 14]);
        let range = (6f32 / 24.).sqrt();
        let mut param_gen = RandParamGen::xavier(seeded_rng(), &t).unwrap();

        let sample = param_gen.sample(t.len()).unwrap();
        assert!(sample.iter().all(|v| v.abs() <= range));
    }

    #[test]
    fn invalid_std_dev_fails() {
        let t = tensor(vec![2, 2]);
        assert!(RandParamGen::normal(seeded_rng(), &t, 0., -1.).is_err());
        assert!(RandParamGen::normal(seeded_rng(), &t, 0., f32::NAN).is_err());
        assert!(RandParamGen::normal(seeded_rng(), &t, 0., 0.).is_ok());
    }

    #[test]
    fn same_seed_same_values() {
        let t = tensor(vec![8, 8]);
        let a = RandParamGen::kaiming(seeded_rng(), &t).unwrap().sample(64);
        let b = RandParamGen::kaiming(seeded_rng(), &t).unwrap().sample(64);
        assert_eq!(a, b);
    }
}
