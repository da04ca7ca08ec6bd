use std::{env, fs, path::Path};

use anyhow::Context;
use conditional_gan::{ConditionalGan, GanConfig, GanStats, grid};
use log::info;
use machine_learning::dataset::{Split, load_mnist};
use rand::{SeedableRng, rngs::StdRng};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => GanConfig::from_path(Path::new(&path))
            .with_context(|| format!("reading config {path}"))?,
        None => GanConfig::default(),
    }
    .with_env_overrides()?;
    config.validate()?;

    info!("training with {config:?}");

    let mut train = load_mnist(&config.data_dir, Split::Train)
        .with_context(|| format!("loading {}", config.data_dir.display()))?;
    if let Some(n) = config.train_limit {
        train.truncate(n);
    }
    train.rescale(-1., 1.);

    let dims = config.dims();
    let mut gan = ConditionalGan::new(
        dims,
        config.init,
        config.learning_rate,
        config.beta1,
        config.seed,
    )?;

    let batch_size = config.batch_size.get();
    let mut rng = StdRng::seed_from_u64(config.seed);

    for epoch in 1..=config.epochs {
        train.shuffle(&mut rng);

        let mut total = GanStats::default();
        let mut steps = 0;

        for batch in train.batches(batch_size, true) {
            let stats = gan.train_step(batch.x.view(), batch.y.view(), &mut rng)?;
            total.d_loss += stats.d_loss;
            total.g_loss += stats.g_loss;
            steps += 1;
        }

        let steps = steps.max(1) as f32;
        info!(
            epoch = epoch,
            d_loss = total.d_loss / steps,
            g_loss = total.g_loss / steps;
            "epoch {epoch}/{} done",
            config.epochs
        );
    }

    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating {}", config.output_dir.display()))?;

    let side = (dims.image as f64).sqrt() as usize;
    let samples = gan.class_grid(config.samples_per_class, &mut rng)?;
    grid::write_pgm(
        &config.output_dir.join("samples.pgm"),
        samples.view(),
        side,
        config.samples_per_class,
    )?;

    gan.save(&config.output_dir)?;
    Ok(())
}
