use std::{path::PathBuf, thread};

/// Everything a training run is launched with besides its experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    /// Name of the registered experiment.
    pub config: String,
    /// Directory holding the `train` and `test` volumes.
    pub path: PathBuf,
    pub seed: u64,
    pub output_dir: PathBuf,
    pub epochs: usize,
    /// Overrides the experiment's batch size.
    pub batch_size: Option<usize>,
    /// Threads producing samples per rank, negative picks a value from the hardware.
    pub num_workers: i64,
    /// Examples between two training log lines.
    pub training_interval: u64,
    /// Examples between two mid-epoch validations, `0` disables them.
    pub validation_interval: u64,
    /// Checkpoint to resume from.
    pub load: Option<PathBuf>,
    /// Run one rank per device instead of splitting batches among device replicas.
    pub ddp: bool,
    /// Amount of devices, `0` meaning a plain CPU run.
    pub devices: usize,
    /// Generate this many volumes instead of reading `path`.
    pub synthetic: Option<usize>,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            config: "default".to_string(),
            path: PathBuf::from("./dataset/cremi"),
            seed: 7,
            output_dir: PathBuf::from("./runs"),
            epochs: 100,
            batch_size: None,
            num_workers: -1,
            training_interval: 200,
            validation_interval: 500,
            load: None,
            ddp: false,
            devices: 1,
            synthetic: None,
        }
    }
}

impl TrainOptions {
    /// The amount of ranks the run is launched with.
    pub fn world_size(&self) -> usize {
        if self.ddp { self.devices.max(1) } else { 1 }
    }

    /// The amount of model replicas each batch is split among within a rank.
    pub fn replicas(&self) -> usize {
        if self.ddp { 1 } else { self.devices.max(1) }
    }

    /// Resolves the amount of loader threads of every rank.
    pub fn workers(&self) -> usize {
        resolve_workers(self.num_workers, self.ddp, self.world_size(), self.devices, cpus())
    }
}

/// The amount of cpus available to the process, at least one.
pub fn cpus() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

/// Picks the amount of loader threads: the requested amount when it isn't negative,
/// otherwise the cpus shared among ranks, or a single thread without devices.
pub fn resolve_workers(
    num_workers: i64,
    ddp: bool,
    world_size: usize,
    devices: usize,
    cpus: usize,
) -> usize {
    if num_workers >= 0 {
        return (num_workers as usize).max(1);
    }

    if ddp {
        (cpus / world_size.max(1)).max(1)
    } else if devices == 0 {
        1
    } else {
        cpus.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_auto_tuning() {
        assert_eq!(resolve_workers(3, true, 2, 2, 16), 3);
        assert_eq!(resolve_workers(-1, true, 4, 4, 16), 4);
        assert_eq!(resolve_workers(-1, true, 32, 32, 16), 1);
        assert_eq!(resolve_workers(-1, false, 1, 0, 16), 1);
        assert_eq!(resolve_workers(-1, false, 1, 1, 16), 16);
    }

    #[test]
    fn ddp_turns_devices_into_ranks() {
        let options = TrainOptions {
            ddp: true,
            devices: 3,
            ..TrainOptions::default()
        };
        assert_eq!((options.world_size(), options.replicas()), (3, 1));

        let options = TrainOptions {
            devices: 3,
            ..TrainOptions::default()
        };
        assert_eq!((options.world_size(), options.replicas()), (1, 3));
    }
}
