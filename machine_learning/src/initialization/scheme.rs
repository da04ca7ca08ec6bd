use std::{cell::RefCell, rc::Rc};

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{ChainedParamGen, ConstParamGen, ParamGen, RandErr, RandParamGen};
use crate::arch::ParamTensor;

/// How the weight tensors of a model are initialized. Biases always start at zero.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InitScheme {
    Normal { std_dev: f32 },
    Uniform { low: f32, high: f32 },
    Kaiming,
    Xavier,
    Lecun,
}

impl Default for InitScheme {
    fn default() -> Self {
        Self::Normal { std_dev: 0.01 }
    }
}

impl InitScheme {
    /// Checks the scheme's arguments describe a distribution that can be sampled.
    pub fn validate(&self) -> Result<(), RandErr> {
        match *self {
            Self::Normal { std_dev } if !(std_dev.is_finite() && std_dev >= 0.) => {
                Err(RandErr::new(format!(
                    "standard deviation must be finite and non-negative, got {std_dev}"
                )))
            }
            Self::Uniform { low, high } if !(low.is_finite() && high.is_finite() && low < high) => {
                Err(RandErr::new(format!("empty uniform range [{low}, {high})")))
            }
            _ => Ok(()),
        }
    }

    /// Builds a generator yielding a whole parameter vector laid out as `layout`.
    ///
    /// # Arguments
    /// * `layout` - The model's tensors, in order.
    /// * `rng` - The random stream every weight tensor is drawn from.
    pub fn param_gen<R: Rng + 'static>(
        self,
        layout: &[ParamTensor],
        rng: Rc<RefCell<R>>,
    ) -> Result<ChainedParamGen, RandErr> {
        let mut param_gens: Vec<Box<dyn ParamGen>> = Vec::with_capacity(layout.len());

        for tensor in layout {
            if tensor.is_bias() {
                param_gens.push(Box::new(ConstParamGen::zeros(tensor.len())));
                continue;
            }

            let rng = rng.clone();
            let param_gen: Box<dyn ParamGen> = match self {
                Self::Normal { std_dev } => {
                    Box::new(RandParamGen::normal(rng, tensor, 0., std_dev)?)
                }
                Self::Uniform { low, high } => {
                    Box::new(RandParamGen::uniform(rng, tensor, low, high)?)
                }
                Self::Kaiming => Box::new(RandParamGen::kaiming(rng, tensor)?),
                Self::Xavier => Box::new(RandParamGen::xavier(rng, tensor)?),
                Self::Lecun => Box::new(RandParamGen::lecun(rng, tensor)?),
            };
            param_gens.push(param_gen);
        }

        Ok(ChainedParamGen::new(param_gens))
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn biases_start_at_zero() {
        let layout = vec![
            ParamTensor::new("layer0.weight".into(), vec![4, 3], 0),
            ParamTensor::new("layer0.bias".into(), vec![3], 12),
        ];
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(7)));

        let mut param_gen = InitScheme::default().param_gen(&layout, rng).unwrap();
        let params = param_gen.sample(15).unwrap();

        assert_eq!(params.len(), 15);
        assert!(params[..12].iter().any(|&w| w != 0.));
        assert_eq!(params[12..], [0.; 3]);
    }

    #[test]
    fn deserializes_tagged() {
        let scheme: InitScheme =
            serde_json::from_str(r#"{"kind":"normal","std_dev":0.05}"#).unwrap();
        assert_eq!(scheme, InitScheme::Normal { std_dev: 0.05 });
    }

    #[test]
    fn negative_std_dev_is_rejected() {
        let scheme = InitScheme::Normal { std_dev: -1. };
        assert!(scheme.validate().is_err());

        let layout = vec![ParamTensor::new("layer0.weight".into(), vec![2, 2], 0)];
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(7)));
        assert!(scheme.param_gen(&layout, rng).is_err());

        assert!(InitScheme::Uniform { low: 1., high: 1. }.validate().is_err());
        assert!(InitScheme::default().validate().is_ok());
        assert!(InitScheme::Kaiming.validate().is_ok());
    }
}
