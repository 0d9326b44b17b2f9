use std::{
    fs,
    path::{Path, PathBuf},
};

use machine_learning::optimization::{AdamW, AdamWState};
use serde::{Deserialize, Serialize};

use crate::{ProofreaderError, Result};

pub const LATEST: &str = "latest.json";

/// What a run needs to resume where it left off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The last completed epoch.
    pub epoch: usize,
    pub example_number: u64,
    pub params: Vec<f32>,
    pub optimizer: AdamWState,
}

impl Checkpoint {
    /// Writes `epoch_{e}.json` and `latest.json` into `dir`.
    ///
    /// # Returns
    /// The path of the epoch's checkpoint.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let bytes = serde_json::to_vec(self)?;
        let path = dir.join(format!("epoch_{}.json", self.epoch));
        fs::write(&path, &bytes)?;
        fs::write(dir.join(LATEST), &bytes)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    /// Moves the saved parameters and optimizer state into a freshly built model.
    ///
    /// # Returns
    /// `CheckpointMismatch` if the checkpoint was taken from a model of another size.
    pub fn restore(self, params: &mut Vec<f32>, optimizer: &mut AdamW) -> Result<()> {
        if self.params.len() != params.len() {
            return Err(ProofreaderError::CheckpointMismatch {
                got: self.params.len(),
                expected: params.len(),
            });
        }

        optimizer.load_state(self.optimizer)?;
        *params = self.params;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use machine_learning::optimization::Optimizer;

    use super::*;

    #[test]
    fn save_then_resume() {
        let dir = tempfile::tempdir().unwrap();
        let mut optimizer = AdamW::new(2, 0.1, (0.9, 0.999), 1e-8, 0.05);
        let mut params = vec![1., 2.];
        optimizer.update_params(&[0.1, 0.1], &mut params).unwrap();

        let checkpoint = Checkpoint {
            epoch: 3,
            example_number: 640,
            params: params.clone(),
            optimizer: optimizer.state().clone(),
        };
        let path = checkpoint.save(dir.path()).unwrap();
        assert!(path.ends_with("epoch_3.json"));

        let latest = Checkpoint::load(&dir.path().join(LATEST)).unwrap();
        assert_eq!(latest, checkpoint);

        let mut fresh = vec![0.; 2];
        let mut fresh_optimizer = AdamW::new(2, 0.1, (0.9, 0.999), 1e-8, 0.05);
        latest.restore(&mut fresh, &mut fresh_optimizer).unwrap();
        assert_eq!(fresh, params);
        assert_eq!(fresh_optimizer.state().step, 1);
    }

    #[test]
    fn a_checkpoint_of_another_model_is_rejected() {
        let checkpoint = Checkpoint {
            epoch: 0,
            example_number: 0,
            params: vec![0.; 3],
            optimizer: AdamWState {
                step: 0,
                m: vec![0.; 3],
                v: vec![0.; 3],
            },
        };

        let mut params = vec![0.; 2];
        let mut optimizer = AdamW::new(2, 0.1, (0.9, 0.999), 1e-8, 0.05);
        assert!(matches!(
            checkpoint.restore(&mut params, &mut optimizer),
            Err(ProofreaderError::CheckpointMismatch {
                got: 3,
                expected: 2
            })
        ));
    }
}
