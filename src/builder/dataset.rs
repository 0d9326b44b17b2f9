use std::sync::Arc;

use log::info;

use crate::{
    ProofreaderError, Result,
    config::{AugmentorConfig, DatasetConfig},
    data::{
        self, Augmentor, DataLoader, Dataset, DistributedSampler, SplitterDataset, Subset, Volume,
    },
    distributed::DistContext,
};

/// How a dataset kind is turned into training and validation subsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    /// Contiguous validation prefix, training on the rest.
    Cremi,
    /// Everything trains, nothing validates.
    Slice,
}

impl DatasetKind {
    pub fn parse(kind: &str) -> Result<Self> {
        match kind {
            "cremi" => Ok(DatasetKind::Cremi),
            "slice" => Ok(DatasetKind::Slice),
            _ => Err(ProofreaderError::UnsupportedKind {
                what: "dataset",
                got: kind.to_string(),
            }),
        }
    }
}

/// Builds the (train, validation) subsets of an experiment.
///
/// # Arguments
/// * `dataset_config` - The dataset kind, sample geometry and split.
/// * `augmentor_config` - Transformations applied to every sample.
/// * `volumes` - The labelled volumes samples are cut from.
/// * `seed` - The seed every sample derives from.
pub fn build_dataset_from_config(
    dataset_config: &DatasetConfig,
    augmentor_config: &AugmentorConfig,
    volumes: Arc<[Volume]>,
    seed: u64,
) -> Result<(Subset<SplitterDataset>, Subset<SplitterDataset>)> {
    let kind = DatasetKind::parse(&dataset_config.dataset)?;

    if !(0. ..1.).contains(&dataset_config.val_split) {
        return Err(ProofreaderError::InvalidConfig(format!(
            "val_split {} is outside of [0, 1)",
            dataset_config.val_split
        )));
    }

    let augmentor = Augmentor::new(augmentor_config.clone())?;
    let dataset = Arc::new(SplitterDataset::new(
        dataset_config,
        augmentor,
        volumes,
        seed,
    )?);

    let (train, val) = match kind {
        DatasetKind::Cremi => data::split(dataset, dataset_config.val_split),
        DatasetKind::Slice => {
            let len = dataset.len();
            (Subset::full(Arc::clone(&dataset)), Subset::new(dataset, len..len))
        }
    };

    info!(train = train.len(), val = val.len(); "split dataset");
    Ok((train, val))
}

/// Wraps both subsets in loaders sharded over the ranks of `ctx`.
///
/// Training shuffles, validation keeps its order, both drop their last incomplete batch.
pub fn build_dataloaders<D: Dataset>(
    train: D,
    val: D,
    batch_size: usize,
    workers: usize,
    ctx: &DistContext,
    seed: u64,
) -> Result<(DataLoader<D>, DataLoader<D>)> {
    let (rank, world_size) = (ctx.rank(), ctx.world_size());

    let train_sampler = DistributedSampler::new(train.len(), world_size, rank, true, seed);
    let val_sampler = DistributedSampler::new(val.len(), world_size, rank, false, seed);

    Ok((
        DataLoader::new(train, train_sampler, batch_size, workers)?,
        DataLoader::new(val, val_sampler, batch_size, workers)?,
    ))
}
