use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use proofreader::training::{self, TrainOptions};

/// Trains a proofreading point-cloud classifier.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Name of the registered experiment.
    #[arg(long, default_value = "default")]
    config: String,

    /// Directory holding the `train` and `test` volumes.
    #[arg(long, default_value = "./dataset/cremi")]
    path: PathBuf,

    #[arg(long, default_value_t = 7)]
    seed: u64,

    #[arg(short, long, default_value = "./runs")]
    output_dir: PathBuf,

    #[arg(short, long, default_value_t = 100)]
    epochs: usize,

    /// Overrides the experiment's batch size.
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Loader threads per rank, -1 picks them from the hardware.
    #[arg(short = 'w', long, default_value_t = -1, allow_hyphen_values = true)]
    num_workers: i64,

    /// Examples between two training log lines.
    #[arg(short, long, default_value_t = 200)]
    training_interval: u64,

    /// Examples between two mid-epoch validations, 0 disables them.
    #[arg(short, long, default_value_t = 500)]
    validation_interval: u64,

    /// Checkpoint to resume from.
    #[arg(long)]
    load: Option<PathBuf>,

    /// One rank per device instead of splitting batches among device replicas.
    #[arg(long)]
    ddp: bool,

    /// Amount of devices, 0 for a plain CPU run.
    #[arg(long, default_value_t = 1)]
    devices: usize,

    /// Train on this many generated volumes instead of reading `--path`.
    #[arg(long, value_name = "N")]
    synthetic: Option<usize>,
}

impl From<Cli> for TrainOptions {
    fn from(cli: Cli) -> Self {
        Self {
            config: cli.config,
            path: cli.path,
            seed: cli.seed,
            output_dir: cli.output_dir,
            epochs: cli.epochs,
            batch_size: cli.batch_size,
            num_workers: cli.num_workers,
            training_interval: cli.training_interval,
            validation_interval: cli.validation_interval,
            load: cli.load,
            ddp: cli.ddp,
            devices: cli.devices,
            synthetic: cli.synthetic,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let options = TrainOptions::from(Cli::parse());
    let outcomes = training::run(&options)
        .with_context(|| format!("training {} failed", options.config))?;

    if let Some(dir) = outcomes.first().and_then(|o| o.run_dir.as_ref()) {
        info!("run written to {}", dir.display());
    }

    Ok(())
}
