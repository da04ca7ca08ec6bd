use std::{cell::RefCell, rc::Rc};

use machine_learning::{
    arch::{
        Model, Sequential,
        activations::ActFn,
        layers::{Layer, PoolKind},
    },
    initialization::InitScheme,
};
use rand::{SeedableRng, rngs::StdRng};

use crate::Result;

/// The side of the square, single channel images `lenet` classifies.
pub const IMAGE_SIDE: usize = 28;
pub const CLASSES: usize = 10;

/// A small LeNet style classifier for 28x28 grayscale digits, producing 10 logits.
///
/// conv 3x3 (1→20) relu, pool 2x2, conv 5x5 (20→50) relu, pool 2x2,
/// dense 800→128 relu, dense 128→10.
pub fn lenet(pool: PoolKind) -> Sequential {
    let relu = || Some(ActFn::relu());

    Sequential::new([
        Layer::conv2d((1, IMAGE_SIDE, IMAGE_SIDE), 20, 3, relu()),
        Layer::pool2d((20, 26, 26), 2, pool),
        Layer::conv2d((20, 13, 13), 50, 5, relu()),
        Layer::pool2d((50, 9, 9), 2, pool),
        Layer::dense((50 * 4 * 4, 128), relu()),
        Layer::dense((128, CLASSES), None),
    ])
}

/// Draws the initial parameters of `model` reproducibly from `seed`.
pub fn init_params(model: &Sequential, scheme: InitScheme, seed: u64) -> Result<Vec<f32>> {
    let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(seed)));
    let mut param_gen = scheme
        .param_gen(&model.layout(), rng)
        .map_err(machine_learning::MlErr::from)?;

    Ok(model.init_params(&mut param_gen)?)
}
