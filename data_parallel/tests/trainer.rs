use std::num::NonZeroUsize;

use data_parallel::{DataParallelTrainer, DpErr, device, models::init_params};
use machine_learning::{
    arch::{
        Sequential,
        activations::ActFn,
        layers::{Layer, PoolKind},
        loss::SoftmaxCrossEntropy,
    },
    dataset::{Dataset, synthetic},
    initialization::InitScheme,
    optimization::{GradientDescent, Optimizer},
};
use rand::{SeedableRng, rngs::StdRng};

const CLASSES: usize = 3;

fn small_convnet() -> Sequential {
    Sequential::new([
        Layer::conv2d((1, 8, 8), 4, 3, Some(ActFn::relu())),
        Layer::pool2d((4, 6, 6), 2, PoolKind::Max),
        Layer::dense((4 * 3 * 3, 16), Some(ActFn::relu())),
        Layer::dense((16, CLASSES), None),
    ])
}

fn dataset(samples: usize) -> Dataset {
    let mut rng = StdRng::seed_from_u64(99);
    synthetic::prototypes(CLASSES, 64, samples, 0.1, &mut rng).unwrap()
}

async fn trainer(k: usize) -> (DataParallelTrainer, Vec<f32>) {
    let model = small_convnet();
    let params = init_params(&model, InitScheme::Kaiming, 7).unwrap();
    let devices = device::enumerate(NonZeroUsize::new(k).unwrap()).unwrap();

    let trainer = DataParallelTrainer::new(
        devices,
        0,
        model,
        params.clone(),
        SoftmaxCrossEntropy,
        || Box::new(GradientDescent::new(0.1)) as Box<dyn Optimizer>,
    )
    .await
    .unwrap();

    (trainer, params)
}

#[tokio::test]
async fn replicas_stay_identical_after_steps() {
    let (trainer, initial) = trainer(4).await;
    let data = dataset(32);

    for batch in data.batches(8, true) {
        trainer.step(batch.x.view(), batch.y.view()).await.unwrap();
    }

    assert!(trainer.replicas_in_sync().await.unwrap());
    assert_ne!(trainer.params().await.unwrap(), initial);
}

#[tokio::test]
async fn k_devices_match_a_single_device() {
    let data = dataset(48);
    let (single, _) = trainer(1).await;
    let (parallel, _) = trainer(3).await;

    for batch in data.batches(12, true) {
        let a = single.step(batch.x.view(), batch.y.view()).await.unwrap();
        let b = parallel.step(batch.x.view(), batch.y.view()).await.unwrap();

        assert_eq!(a.samples, b.samples);
        assert!((a.loss - b.loss).abs() < 1e-3 * a.loss.abs().max(1.0));
    }

    let expected = single.params().await.unwrap();
    let got = parallel.params().await.unwrap();

    let max_diff = expected
        .iter()
        .zip(&got)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);
    assert!(max_diff < 1e-4, "parameters differ by up to {max_diff}");
}

#[tokio::test]
async fn indivisible_batch_is_fatal() {
    let (trainer, _) = trainer(2).await;
    let data = dataset(5);

    let err = trainer.step(data.x(), data.y()).await.unwrap_err();
    assert!(matches!(
        err,
        DpErr::IndivisibleBatch {
            batch_size: 5,
            devices: 2
        }
    ));
}

#[tokio::test]
async fn epoch_improves_and_evaluation_is_read_only() {
    let (trainer, _) = trainer(2).await;
    let mut train = dataset(60);
    let test = dataset(30);
    let mut rng = StdRng::seed_from_u64(1);

    let before = trainer.evaluate(&test, 7).await.unwrap();
    let params = trainer.params().await.unwrap();
    let again = trainer.evaluate(&test, 10).await.unwrap();

    assert_eq!(before.samples, 30);
    assert!((before.loss - again.loss).abs() < 1e-5);
    assert_eq!(trainer.params().await.unwrap(), params);

    for _ in 0..5 {
        let stats = trainer.train_epoch(&mut train, 10, true, &mut rng).await.unwrap();
        assert_eq!(stats.samples, 60);
    }

    let after = trainer.evaluate(&test, 10).await.unwrap();
    assert!(after.loss < before.loss, "{} >= {}", after.loss, before.loss);

    let metrics = trainer.metrics();
    assert_eq!(metrics.len(), 2);
    assert!(metrics.iter().all(|m| m.steps == 30 && m.samples == 150));
}

#[tokio::test]
async fn evaluation_batch_size_only_changes_the_command_count() {
    let (trainer, _) = trainer(2).await;
    let test = dataset(30);

    let before = trainer.metrics()[0].commands;
    let small = trainer.evaluate(&test, 4).await.unwrap();
    let after = trainer.metrics()[0].commands;
    let whole = trainer.evaluate(&test, 30).await.unwrap();

    // 7 full batches and a trailing one of 2 samples
    assert_eq!(after - before, 8);
    assert_eq!(small.samples, whole.samples);
    assert!((small.loss - whole.loss).abs() < 1e-4 * whole.loss.abs().max(1.0));
    assert_eq!(small.accuracy, whole.accuracy);
}
