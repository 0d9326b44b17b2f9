//! Experiment configuration to datasets, loaders and models.

mod dataset;
mod model;

pub use dataset::{DatasetKind, build_dataloaders, build_dataset_from_config};
pub use model::{
    ADAMW_BETAS, ADAMW_EPSILON, ADAMW_WEIGHT_DECAY, LossKind, OptimizerKind,
    build_full_model_from_config, parse_backbone,
};
