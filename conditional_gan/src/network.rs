use std::{cell::RefCell, path::Path, rc::Rc};

use machine_learning::{
    arch::{Model, ParamTensor, Sequential},
    checkpoint,
    initialization::InitScheme,
    optimization::{Adam, Optimizer},
};
use ndarray::Array2;
use rand::rngs::StdRng;

use crate::Result;

/// A model together with its own parameters, gradient and optimizer state.
pub(crate) struct Network {
    model: Sequential,
    params: Vec<f32>,
    grad: Vec<f32>,
    optimizer: Adam,
}

impl Network {
    pub fn new(
        model: Sequential,
        init: InitScheme,
        rng: Rc<RefCell<StdRng>>,
        learning_rate: f32,
        beta1: f32,
    ) -> Result<Self> {
        model.check_shapes()?;

        let mut param_gen = init
            .param_gen(&model.layout(), rng)
            .map_err(machine_learning::MlErr::from)?;
        let params = model.init_params(&mut param_gen)?;
        let size = params.len();

        Ok(Self {
            model,
            params,
            grad: vec![0.; size],
            optimizer: Adam::with_beta1(size, learning_rate, beta1),
        })
    }

    pub fn forward(&mut self, x: &Array2<f32>) -> Result<Array2<f32>> {
        let out = self.model.forward(&self.params, x.view())?;
        Ok(out.to_owned())
    }

    /// Overwrites the gradient with the one of the last forward pass, returning the delta of
    /// its input.
    pub fn backward(&mut self, d_out: Array2<f32>) -> Result<Array2<f32>> {
        Ok(self.model.backward(&self.params, &mut self.grad, d_out)?)
    }

    pub fn update(&mut self, batch_size: usize) -> Result<()> {
        Ok(self
            .optimizer
            .update_params(&self.grad, &mut self.params, batch_size)?)
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn layout(&self) -> Vec<ParamTensor> {
        self.model.layout()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        Ok(checkpoint::save(path, &self.layout(), &self.params)?)
    }

    pub fn load(&mut self, path: &Path) -> Result<()> {
        self.params = checkpoint::load(path, &self.layout())?;
        Ok(())
    }
}
