use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

/// Restricts every rank to its own share of a dataset's indices.
///
/// Every rank gets `ceil(len / world_size)` indices: the (optionally shuffled) index list
/// is padded by wrapping around and then strided by rank, so all ranks iterate the same
/// amount of batches.
#[derive(Debug, Clone)]
pub struct DistributedSampler {
    len: usize,
    world_size: usize,
    rank: usize,
    shuffle: bool,
    seed: u64,
    epoch: u64,
}

impl DistributedSampler {
    /// Creates a new `DistributedSampler`.
    ///
    /// # Arguments
    /// * `len` - The length of the dataset.
    /// * `world_size` - The amount of ranks sharing it, at least one.
    /// * `rank` - This rank, below `world_size`.
    /// * `shuffle` - Whether to permute the indices every epoch.
    /// * `seed` - Shared by every rank so permutations agree.
    pub fn new(len: usize, world_size: usize, rank: usize, shuffle: bool, seed: u64) -> Self {
        let world_size = world_size.max(1);

        Self {
            len,
            world_size,
            rank: rank.min(world_size - 1),
            shuffle,
            seed,
            epoch: 0,
        }
    }

    /// Changes the permutation used by the next `indices` call.
    pub fn set_epoch(&mut self, epoch: u64) {
        self.epoch = epoch;
    }

    /// The amount of indices of this rank.
    pub fn num_samples(&self) -> usize {
        self.len.div_ceil(self.world_size)
    }

    pub fn indices(&self) -> Vec<usize> {
        if self.len == 0 {
            return Vec::new();
        }

        let mut all: Vec<usize> = (0..self.len).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(self.epoch));
            all.shuffle(&mut rng);
        }

        let total = self.num_samples() * self.world_size;
        all.into_iter()
            .cycle()
            .take(total)
            .skip(self.rank)
            .step_by(self.world_size)
            .collect()
    }
}
