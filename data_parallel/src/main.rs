use std::{env, path::Path};

use anyhow::Context;
use data_parallel::{
    DataParallelTrainer, TrainingConfig, device,
    models::{init_params, lenet},
};
use log::info;
use machine_learning::{
    arch::{Model, loss::SoftmaxCrossEntropy},
    checkpoint,
};
use rand::{SeedableRng, rngs::StdRng};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => TrainingConfig::from_path(Path::new(&path))
            .with_context(|| format!("reading config {path}"))?,
        None => TrainingConfig::default(),
    }
    .with_env_overrides()?;
    config.validate()?;

    info!("training with {config:?}");

    let (mut train, test) = config.dataset.load(config.seed)?;
    let model = lenet(config.pooling);
    let params = init_params(&model, config.init, config.seed)?;
    let size = model.size();

    let devices = device::enumerate(config.devices)?;
    if config.devices > device::available() {
        info!(
            "{} devices requested but only {} can run in parallel",
            config.devices,
            device::available()
        );
    }

    let (optimizer, lr) = (config.optimizer, config.learning_rate);
    let trainer = DataParallelTrainer::new(
        devices,
        config.home_device,
        model,
        params,
        SoftmaxCrossEntropy,
        move || optimizer.build(size, lr),
    )
    .await?;

    let batch_size = config.batch_size.get();
    let mut rng = StdRng::seed_from_u64(config.seed);

    for epoch in 1..=config.epochs {
        let train_stats = trainer
            .train_epoch(&mut train, batch_size, config.drop_last, &mut rng)
            .await?;
        let test_stats = trainer.evaluate(&test, batch_size).await?;

        info!(
            epoch = epoch,
            train_loss = train_stats.loss,
            train_acc = train_stats.accuracy,
            test_loss = test_stats.loss,
            test_acc = test_stats.accuracy;
            "epoch {epoch}/{} done in {:.1?}",
            config.epochs,
            train_stats.elapsed
        );
    }

    anyhow::ensure!(
        trainer.replicas_in_sync().await?,
        "replicas diverged during training"
    );

    if let Some(path) = &config.checkpoint {
        let params = trainer.params().await?;
        checkpoint::save(path, trainer.layout(), &params)?;
    }

    for (i, metrics) in trainer.metrics().iter().enumerate() {
        info!(
            "device {i}: {} steps, {} samples, {} commands, busy {:.1?}",
            metrics.steps, metrics.samples, metrics.commands, metrics.busy
        );
    }

    Ok(())
}
