//! The per-rank training loop and everything rank 0 records about it.

mod checkpoint;
mod metrics;
mod options;
mod output;
mod progress;
mod replicas;
mod trainer;
mod writer;

pub use checkpoint::{Checkpoint, LATEST};
pub use metrics::{IntervalAccumulator, crossed};
pub use options::{TrainOptions, cpus, resolve_workers};
pub use output::{CONFIG_FILE, RunOutput, create_version_dir};
pub use progress::Progress;
pub use replicas::{Replicas, StepStats, shard_range};
pub use trainer::{RunOutcome, SYNTHETIC_SHAPE, run, run_with};
pub use writer::{SCALARS_FILE, Scalar, ScalarWriter, read_scalars};
