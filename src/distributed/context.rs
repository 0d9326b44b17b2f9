use std::sync::Arc;

use super::{ProcessGroup, RENDEZVOUS, ReduceOp};
use crate::Result;

/// Proof of being rank 0: only the holder may touch the run's shared outputs.
#[derive(Debug)]
pub struct Leader {
    _private: (),
}

/// Identity of a rank within its process group.
#[derive(Debug, Clone)]
pub struct DistContext {
    rank: usize,
    group: Arc<ProcessGroup>,
}

impl DistContext {
    /// Creates the context of `rank` within `group`.
    pub fn new(rank: usize, group: Arc<ProcessGroup>) -> Self {
        Self { rank, group }
    }

    /// A context for a run without peers.
    pub fn single() -> Self {
        Self::new(0, Arc::new(ProcessGroup::new(1, RENDEZVOUS)))
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn world_size(&self) -> usize {
        self.group.world_size()
    }

    pub fn is_distributed(&self) -> bool {
        self.world_size() > 1
    }

    pub fn group(&self) -> &ProcessGroup {
        &self.group
    }

    /// Returns the leader capability when this is rank 0.
    pub fn leader(&self) -> Option<Leader> {
        (self.rank == 0).then_some(Leader { _private: () })
    }

    /// Averages `buf` across every rank.
    pub fn all_reduce_mean(&self, buf: &mut [f32]) -> Result<()> {
        self.group.all_reduce(buf, ReduceOp::Mean)
    }

    /// Sums `buf` across every rank.
    pub fn all_reduce_sum(&self, buf: &mut [f32]) -> Result<()> {
        self.group.all_reduce(buf, ReduceOp::Sum)
    }

    pub fn barrier(&self) -> Result<()> {
        self.group.barrier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rank_zero_leads() {
        let group = Arc::new(ProcessGroup::new(2, RENDEZVOUS));
        assert!(DistContext::new(0, Arc::clone(&group)).leader().is_some());
        assert!(DistContext::new(1, group).leader().is_none());
    }

    #[test]
    fn single_is_not_distributed() {
        let ctx = DistContext::single();
        assert_eq!((ctx.rank(), ctx.world_size()), (0, 1));
        assert!(!ctx.is_distributed());
    }
}
