use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::info;

use super::{Checkpoint, Progress, ScalarWriter, TrainOptions, cpus};
use crate::{Result, config::ExperimentConfig, distributed::Leader};

pub const CONFIG_FILE: &str = "config.txt";

/// Creates `{output_dir}/{name}_{v}` for the first `v` that isn't taken yet.
pub fn create_version_dir(_leader: &Leader, output_dir: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;

    let mut version = 0u64;
    loop {
        let dir = output_dir.join(format!("{name}_{version}"));

        match fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => version += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// The files a run leaves behind, owned by rank 0.
#[derive(Debug)]
pub struct RunOutput {
    _leader: Leader,
    dir: PathBuf,
    train: ScalarWriter,
    valid: ScalarWriter,
    progress: Progress,
}

impl RunOutput {
    /// Creates the run's version directory, dumps its configuration and opens its logs.
    pub fn create(
        leader: Leader,
        options: &TrainOptions,
        config: &ExperimentConfig,
    ) -> Result<Self> {
        let dir = create_version_dir(&leader, &options.output_dir, &config.name)?;
        let resolved = TrainOptions {
            num_workers: options.workers() as i64,
            ..options.clone()
        };
        fs::write(
            dir.join(CONFIG_FILE),
            format!(
                "{}\nTRAINING\n{resolved:?}\nworld_size: {}\ncpus: {}\n",
                config.describe(),
                options.world_size(),
                cpus(),
            ),
        )?;

        let log = dir.join("log");
        let train = ScalarWriter::create(&log.join("train"))?;
        let valid = ScalarWriter::create(&log.join("valid"))?;
        info!("writing run outputs to {}", dir.display());

        Ok(Self {
            _leader: leader,
            dir,
            train,
            valid,
            progress: Progress::new(options.epochs),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn progress(&mut self) -> &mut Progress {
        &mut self.progress
    }

    pub fn log_train(&mut self, loss: f32, accuracy: f32, step: u64) -> Result<()> {
        info!(step = step, loss = loss, accuracy = accuracy; "train");
        self.train.add_scalar("Loss", loss, step)?;
        self.train.add_scalar("Accuracy", accuracy, step)
    }

    pub fn log_valid(&mut self, loss: f32, accuracy: f32, step: u64) -> Result<()> {
        info!(step = step, loss = loss, accuracy = accuracy; "validation");
        self.valid.add_scalar("Loss", loss, step)?;
        self.valid.add_scalar("Accuracy", accuracy, step)?;
        self.valid.flush()
    }

    pub fn save_checkpoint(&mut self, checkpoint: &Checkpoint) -> Result<PathBuf> {
        self.train.flush()?;
        let path = checkpoint.save(&self.dir.join("checkpoints"))?;
        info!("saved checkpoint {}", path.display());
        Ok(path)
    }

    /// Flushes every log and returns the run's directory.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.train.flush()?;
        self.valid.flush()?;
        self.progress.finish();
        Ok(self.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::DistContext;

    #[test]
    fn versions_are_allocated_in_order() {
        let out = tempfile::tempdir().unwrap();
        let leader = DistContext::single().leader().unwrap();

        let first = create_version_dir(&leader, out.path(), "default").unwrap();
        assert!(first.ends_with("default_0"));

        let second = create_version_dir(&leader, out.path(), "default").unwrap();
        assert!(second.ends_with("default_1"));
    }

    #[test]
    fn config_dump_has_the_training_line() {
        let out = tempfile::tempdir().unwrap();
        let options = TrainOptions {
            output_dir: out.path().to_path_buf(),
            ..TrainOptions::default()
        };
        let config = ExperimentConfig::new("dump");
        let leader = DistContext::single().leader().unwrap();

        let run = RunOutput::create(leader, &options, &config).unwrap();
        let dump = fs::read_to_string(run.dir().join(CONFIG_FILE)).unwrap();
        assert!(dump.starts_with("NAME\ndump"));
        assert!(dump.contains("TRAINING\nTrainOptions"));
        assert!(dump.contains(&format!("num_workers: {}", cpus())));
        assert!(!dump.contains("num_workers: -1"));
        assert!(dump.contains("world_size: 1\n"));
        assert!(run.dir().join("log/train").is_dir());
        assert!(run.dir().join("log/valid").is_dir());
    }
}
