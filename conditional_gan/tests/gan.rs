use conditional_gan::{ConditionalGan, Dims, GanErr, one_hot};
use machine_learning::initialization::InitScheme;
use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng};

fn small_dims() -> Dims {
    Dims {
        latent: 8,
        hidden: 16,
        image: 16,
        classes: 3,
    }
}

fn small_gan() -> ConditionalGan {
    ConditionalGan::new(small_dims(), InitScheme::Xavier, 2e-4, 0.5, 11).unwrap()
}

/// Images in [-1, 1] with a different bright stripe per class.
fn batch(n: usize) -> (Array2<f32>, Array2<f32>) {
    let labels: Vec<usize> = (0..n).map(|i| i % 3).collect();
    let images = Array2::from_shape_fn((n, 16), |(i, p)| {
        if p % 3 == labels[i] { 0.9 } else { -0.9 }
    });

    (images, one_hot(&labels, 3).unwrap())
}

#[test]
fn train_step_changes_both_networks() {
    let mut gan = small_gan();
    let mut rng = StdRng::seed_from_u64(0);
    let (images, labels) = batch(12);

    let generator = gan.generator_params().to_vec();
    let discriminator = gan.discriminator_params().to_vec();

    let stats = gan.train_step(images.view(), labels.view(), &mut rng).unwrap();

    assert!(stats.d_loss.is_finite() && stats.d_loss > 0.);
    assert!(stats.g_loss.is_finite() && stats.g_loss > 0.);
    assert_ne!(gan.generator_params(), generator);
    assert_ne!(gan.discriminator_params(), discriminator);
}

#[test]
fn generated_images_stay_in_range() {
    let mut gan = small_gan();
    let mut rng = StdRng::seed_from_u64(1);
    let (images, labels) = batch(9);

    for _ in 0..20 {
        gan.train_step(images.view(), labels.view(), &mut rng).unwrap();
    }

    let generated = gan.generate(&[0, 1, 2, 2], &mut rng).unwrap();
    assert_eq!(generated.dim(), (4, 16));
    assert!(generated.iter().all(|v| (-1.0..=1.0).contains(v)));

    let grid = gan.class_grid(2, &mut rng).unwrap();
    assert_eq!(grid.dim(), (6, 16));
}

#[test]
fn mismatched_batch_is_rejected() {
    let mut gan = small_gan();
    let mut rng = StdRng::seed_from_u64(3);
    let (images, _) = batch(4);
    let (_, labels) = batch(5);

    let err = gan.train_step(images.view(), labels.view(), &mut rng).unwrap_err();
    assert!(matches!(err, GanErr::Ml(_)));
}

#[test]
fn checkpoints_restore_both_networks() {
    let dir = tempfile::tempdir().unwrap();
    let mut gan = small_gan();
    let mut rng = StdRng::seed_from_u64(4);
    let (images, labels) = batch(6);

    gan.train_step(images.view(), labels.view(), &mut rng).unwrap();
    gan.save(dir.path()).unwrap();

    let mut restored =
        ConditionalGan::new(small_dims(), InitScheme::Xavier, 2e-4, 0.5, 99).unwrap();
    assert_ne!(restored.generator_params(), gan.generator_params());

    restored.load(dir.path()).unwrap();
    assert_eq!(restored.generator_params(), gan.generator_params());
    assert_eq!(restored.discriminator_params(), gan.discriminator_params());
}
