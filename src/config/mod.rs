//! Named, immutable experiment configurations.

mod registry;

use std::path::PathBuf;

pub use registry::{ConfigRegistry, get_config, register_configs};

/// Which augmentations are applied to every point cloud, and the scale it's normalized by.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentorConfig {
    pub shuffle: bool,
    pub center: bool,
    pub rotate: bool,
    pub scale: bool,
    pub jitter: bool,
    /// Divisors of the (z, y, x) coordinates.
    pub normalize: (f32, f32, f32),
}

impl Default for AugmentorConfig {
    fn default() -> Self {
        Self {
            shuffle: false,
            center: false,
            rotate: false,
            scale: false,
            jitter: false,
            normalize: (125., 1250., 1250.),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetConfig {
    /// The dataset kind, `cremi` or `slice`.
    pub dataset: String,
    /// Inclusive range of the amount of slices removed between both halves of a sample.
    pub num_slices: (usize, usize),
    /// Half the side of the y/x window around the cut, in voxels.
    pub radius: usize,
    /// Slices kept on each side of the cut.
    pub context_slices: usize,
    pub num_points: usize,
    pub batch_size: usize,
    pub val_split: f64,
    pub epoch_multiplier: usize,
    /// Where the volumes live, the CLI path is used when unset.
    pub path: Option<PathBuf>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            dataset: "cremi".to_string(),
            num_slices: (1, 4),
            radius: 96,
            context_slices: 6,
            num_points: 1024,
            batch_size: 64,
            val_split: 0.15,
            epoch_multiplier: 1,
            path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// The backbone kind, `pointnet` or `curvenet`.
    pub model: String,
    /// The loss kind, `nll`, `ce` or `bce`.
    pub loss: String,
    pub optimizer: String,
    pub dim: usize,
    pub learning_rate: f32,
    pub num_classes: usize,
    pub class_weights: Option<Vec<f32>>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "pointnet".to_string(),
            loss: "nll".to_string(),
            optimizer: "AdamW".to_string(),
            dim: 256,
            learning_rate: 1e-3,
            num_classes: 2,
            class_weights: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    /// Derive every random stream from the run's seed.
    pub deterministic: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            deterministic: true,
        }
    }
}

/// Everything that defines an experiment besides the run options.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
    pub name: String,
    pub dataset: DatasetConfig,
    pub model: ModelConfig,
    pub augmentor: AugmentorConfig,
    pub trainer: TrainerConfig,
}

impl ExperimentConfig {
    /// Creates a configuration with every section at its default.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dataset: DatasetConfig::default(),
            model: ModelConfig::default(),
            augmentor: AugmentorConfig::default(),
            trainer: TrainerConfig::default(),
        }
    }

    /// Renders the human readable dump stored next to a run's outputs.
    pub fn describe(&self) -> String {
        format!(
            "NAME\n{}\n\nDATASET\n{:#?}\n\nMODEL\n{:#?}\n\nAUGMENTOR\n{:#?}\n\nTRAINER\n{:#?}\n",
            self.name, self.dataset, self.model, self.augmentor, self.trainer
        )
    }
}
