use std::sync::Arc;

use proofreader::{
    ProofreaderError,
    config::ExperimentConfig,
    data::{Volume, synthetic_volumes},
    distributed::launch,
    training::{self, TrainOptions},
};

fn mk_config() -> ExperimentConfig {
    let mut config = ExperimentConfig::new("tiny");
    config.dataset.num_points = 32;
    config.dataset.radius = 16;
    config.dataset.context_slices = 3;
    config.model.dim = 16;
    config.augmentor.rotate = true;
    config.augmentor.jitter = true;
    config
}

fn mk_volumes() -> Arc<[Volume]> {
    synthetic_volumes(2, (12, 48, 48), 11).into()
}

#[test]
fn ddp_ranks_keep_identical_parameters() {
    let out = tempfile::tempdir().unwrap();
    let options = TrainOptions {
        output_dir: out.path().to_path_buf(),
        epochs: 2,
        batch_size: Some(2),
        num_workers: 1,
        training_interval: 4,
        validation_interval: 8,
        ddp: true,
        devices: 2,
        ..TrainOptions::default()
    };

    let outcomes = training::run_with(&options, &mk_config(), mk_volumes()).unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].params, outcomes[1].params);
    assert_eq!(outcomes[0].example_number, outcomes[1].example_number);
    assert!(outcomes[0].run_dir.is_some());
    assert!(outcomes[1].run_dir.is_none());
}

#[test]
fn device_replicas_train_like_a_single_device() {
    let out = tempfile::tempdir().unwrap();
    let options = |devices| TrainOptions {
        output_dir: out.path().to_path_buf(),
        epochs: 1,
        batch_size: Some(4),
        num_workers: 1,
        devices,
        ..TrainOptions::default()
    };

    let one = training::run_with(&options(1), &mk_config(), mk_volumes()).unwrap();
    let two = training::run_with(&options(2), &mk_config(), mk_volumes()).unwrap();

    assert_eq!(one[0].example_number, two[0].example_number);

    // summation order differs, so only the bulk of the parameters has to agree
    let (a, b) = (&one[0].params, &two[0].params);
    let mean_diff = a.iter().zip(b).map(|(a, b)| (a - b).abs()).sum::<f32>() / a.len() as f32;
    assert!(mean_diff < 1e-4, "mean difference {mean_diff}");
}

#[test]
fn a_failing_rank_aborts_the_group() {
    let err = launch::<(), _>(3, |ctx| {
        if ctx.rank() == 2 {
            return Err(ProofreaderError::InvalidConfig("rank 2 gave up".to_string()));
        }

        let mut grad = vec![1.; 4];
        loop {
            ctx.all_reduce_mean(&mut grad)?;
        }
    })
    .unwrap_err();

    assert!(matches!(err, ProofreaderError::InvalidConfig(msg) if msg == "rank 2 gave up"));
}
