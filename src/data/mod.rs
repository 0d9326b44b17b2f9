//! Volumes, the point-cloud datasets cut out of them and their loaders.

mod augment;
mod dataloader;
mod dataset;
mod sampler;
mod splitter;
mod volume;

pub use augment::Augmentor;
pub use dataloader::{Batch, Batches, DataLoader};
pub use dataset::{Dataset, PointSample, Subset, split};
pub use sampler::DistributedSampler;
pub use splitter::{FALSE_MERGE, SAME_OBJECT, SplitterDataset};
pub use volume::{Volume, prepare_volumes, synthetic_volumes};
