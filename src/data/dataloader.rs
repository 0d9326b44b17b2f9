use ndarray::{Array3, Axis};
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};

use super::{Dataset, DistributedSampler, PointSample};
use crate::{DataError, ProofreaderError, Result};

/// A batch of point clouds and their classes.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// `[batch, num_points, 3]`.
    pub clouds: Array3<f32>,
    pub labels: Vec<usize>,
}

impl Batch {
    /// Stacks samples that share the same amount of points.
    pub fn stack(samples: Vec<PointSample>) -> std::result::Result<Self, DataError> {
        let Some(first) = samples.first() else {
            return Err(DataError::InvalidVolume("cannot stack an empty batch".to_string()));
        };

        let points = first.points.nrows();
        let mut clouds = Array3::zeros((samples.len(), points, 3));
        let mut labels = Vec::with_capacity(samples.len());

        for (mut cloud, sample) in clouds.axis_iter_mut(Axis(0)).zip(samples) {
            if sample.points.dim() != (points, 3) {
                return Err(DataError::InvalidVolume(format!(
                    "sample of shape {:?} in a batch of {points} points",
                    sample.points.dim()
                )));
            }

            cloud.assign(&sample.points);
            labels.push(sample.label);
        }

        Ok(Self { clouds, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Batches a rank's share of a dataset, dropping the last incomplete batch.
///
/// Samples of a batch are produced in parallel on a dedicated pool of `workers` threads.
pub struct DataLoader<D> {
    dataset: D,
    sampler: DistributedSampler,
    batch_size: usize,
    pool: ThreadPool,
}

impl<D: Dataset> DataLoader<D> {
    /// Creates a new `DataLoader`.
    ///
    /// # Arguments
    /// * `dataset` - The samples.
    /// * `sampler` - Which indices this rank visits and in which order.
    /// * `batch_size` - The amount of samples per batch.
    /// * `workers` - The amount of threads producing samples.
    pub fn new(
        dataset: D,
        sampler: DistributedSampler,
        batch_size: usize,
        workers: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(ProofreaderError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("loader-{i}"))
            .build()
            .map_err(|e| ProofreaderError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            dataset,
            sampler,
            batch_size,
            pool,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    /// The amount of full batches per epoch.
    pub fn len(&self) -> usize {
        self.sampler.num_samples() / self.batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_epoch(&mut self, epoch: u64) {
        self.sampler.set_epoch(epoch);
    }

    /// This rank's indices for the current epoch, in visiting order.
    pub fn indices(&self) -> Vec<usize> {
        self.sampler.indices()
    }

    /// Iterates over the batches of the current epoch.
    pub fn iter(&self) -> Batches<'_, D> {
        Batches {
            loader: self,
            indices: self.indices(),
            next: 0,
        }
    }

    /// Produces the batch holding the samples at `indices`.
    pub fn fetch(&self, indices: &[usize]) -> Result<Batch> {
        let samples = self.pool.install(|| {
            indices
                .par_iter()
                .map(|&i| self.dataset.get(i))
                .collect::<std::result::Result<Vec<_>, _>>()
        })?;

        Ok(Batch::stack(samples)?)
    }
}

/// The batches of one epoch, see `DataLoader::iter`.
pub struct Batches<'a, D> {
    loader: &'a DataLoader<D>,
    indices: Vec<usize>,
    next: usize,
}

impl<D: Dataset> Iterator for Batches<'_, D> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch_size = self.loader.batch_size;
        let end = self.next + batch_size;

        if end > self.indices.len() {
            return None;
        }

        let batch = self.loader.fetch(&self.indices[self.next..end]);
        self.next = end;
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    struct Labelled(usize);

    impl Dataset for Labelled {
        fn len(&self) -> usize {
            self.0
        }

        fn get(&self, index: usize) -> std::result::Result<PointSample, DataError> {
            Ok(PointSample {
                points: Array2::from_elem((4, 3), index as f32),
                label: index,
            })
        }
    }

    #[test]
    fn drops_the_last_incomplete_batch() {
        let sampler = DistributedSampler::new(10, 1, 0, false, 0);
        let loader = DataLoader::new(Labelled(10), sampler, 4, 2).unwrap();
        assert_eq!(loader.len(), 2);

        let batches: Vec<Batch> = loader.iter().collect::<Result<_>>().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].labels, [4, 5, 6, 7]);
        assert_eq!(batches[1].clouds.dim(), (4, 4, 3));
        assert_eq!(batches[1].clouds[[2, 0, 0]], 6.);
    }

    #[test]
    fn ranks_see_disjoint_batches() {
        let a = DataLoader::new(Labelled(8), DistributedSampler::new(8, 2, 0, false, 0), 2, 1)
            .unwrap();
        let b = DataLoader::new(Labelled(8), DistributedSampler::new(8, 2, 1, false, 0), 2, 1)
            .unwrap();

        let labels = |l: &DataLoader<Labelled>| -> Vec<usize> {
            l.iter().flat_map(|b| b.unwrap().labels).collect()
        };
        assert_eq!(labels(&a), [0, 2, 4, 6]);
        assert_eq!(labels(&b), [1, 3, 5, 7]);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let sampler = DistributedSampler::new(1, 1, 0, false, 0);
        assert!(DataLoader::new(Labelled(1), sampler, 0, 1).is_err());
    }
}
