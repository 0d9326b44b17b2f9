use std::{fs, path::Path};

use proofreader::{
    config::get_config,
    training::{self, CONFIG_FILE, Checkpoint, LATEST, TrainOptions, read_scalars},
};

fn mk_options(output_dir: &Path) -> TrainOptions {
    TrainOptions {
        config: "default".to_string(),
        output_dir: output_dir.to_path_buf(),
        epochs: 1,
        batch_size: Some(4),
        num_workers: 2,
        training_interval: 8,
        validation_interval: 0,
        synthetic: Some(2),
        ..TrainOptions::default()
    }
}

#[test]
fn default_config_trains_one_epoch() {
    let out = tempfile::tempdir().unwrap();
    let options = mk_options(out.path());

    let outcomes = training::run(&options).unwrap();
    assert_eq!(outcomes.len(), 1);

    let run_dir = outcomes[0].run_dir.clone().unwrap();
    assert!(run_dir.ends_with("default_0"));

    let dump = fs::read_to_string(run_dir.join(CONFIG_FILE)).unwrap();
    assert!(dump.contains("TRAINING"));

    // 2 volumes of 16 neurites: 4 validate, 27 train, 6 full batches of 4
    assert_eq!(outcomes[0].example_number, 24);

    let train = read_scalars(&run_dir.join("log/train")).unwrap();
    assert!(!train.is_empty());
    assert!(train.iter().any(|s| s.tag == "Loss" && s.step == 8));
    assert!(train.iter().all(|s| s.value.is_finite()));

    let valid = read_scalars(&run_dir.join("log/valid")).unwrap();
    assert_eq!(valid.len(), 2);
    assert!(valid.iter().all(|s| s.step == 24));

    let checkpoint = Checkpoint::load(&run_dir.join("checkpoints").join(LATEST)).unwrap();
    assert_eq!(checkpoint.epoch, 0);
    assert_eq!(checkpoint.params, outcomes[0].params);
}

#[test]
fn runs_get_their_own_version_and_can_resume() {
    let out = tempfile::tempdir().unwrap();
    let first = training::run(&mk_options(out.path())).unwrap();
    let first_dir = first[0].run_dir.clone().unwrap();

    let resumed = TrainOptions {
        epochs: 2,
        load: Some(first_dir.join("checkpoints").join("epoch_0.json")),
        ..mk_options(out.path())
    };
    let second = training::run(&resumed).unwrap();
    let second_dir = second[0].run_dir.clone().unwrap();

    assert!(second_dir.ends_with("default_1"));
    assert_eq!(second[0].example_number, 48);
    assert_ne!(second[0].params, first[0].params);
    assert!(second_dir.join("checkpoints/epoch_1.json").is_file());
    assert!(!second_dir.join("checkpoints/epoch_0.json").exists());
}

#[test]
fn resuming_another_model_fails() {
    let out = tempfile::tempdir().unwrap();
    let first = training::run(&mk_options(out.path())).unwrap();
    let checkpoint = first[0].run_dir.clone().unwrap().join("checkpoints").join(LATEST);

    let options = TrainOptions {
        config: "curvenet".to_string(),
        load: Some(checkpoint),
        ..mk_options(out.path())
    };
    assert!(training::run(&options).is_err());
}

#[test]
fn unknown_config_is_reported() {
    let out = tempfile::tempdir().unwrap();
    let options = TrainOptions {
        config: "missing".to_string(),
        ..mk_options(out.path())
    };

    let err = training::run(&options).unwrap_err();
    assert_eq!(err.to_string(), "config not found: missing");
    assert!(get_config("default").is_ok());
}
