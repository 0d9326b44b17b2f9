use machine_learning::MlErr;
use parking_lot::{Condvar, Mutex};

use crate::{ProofreaderError, Result};

/// Where ranks meet, kept for parity with multi-process launches.
pub const RENDEZVOUS: &str = "localhost:12355";

/// How the buffers of every rank are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Mean,
}

#[derive(Debug, Default)]
struct Collective {
    generation: u64,
    arrived: usize,
    acc: Vec<f32>,
    result: Vec<f32>,
    aborted: bool,
}

/// The ranks of a training run and the collectives they synchronize through.
///
/// Every collective is a generation barrier: the last rank to arrive reduces the
/// accumulated buffers and wakes the others up. Aborting the group wakes every waiting
/// rank with `CollectiveAborted`, so a failing rank never leaves its peers blocked.
#[derive(Debug)]
pub struct ProcessGroup {
    world_size: usize,
    rendezvous: String,
    state: Mutex<Collective>,
    arrived: Condvar,
}

impl ProcessGroup {
    /// Creates a new `ProcessGroup`.
    ///
    /// # Arguments
    /// * `world_size` - The amount of ranks, at least one.
    /// * `rendezvous` - The address ranks meet at.
    pub fn new(world_size: usize, rendezvous: &str) -> Self {
        Self {
            world_size: world_size.max(1),
            rendezvous: rendezvous.to_string(),
            state: Mutex::new(Collective::default()),
            arrived: Condvar::new(),
        }
    }

    pub fn world_size(&self) -> usize {
        self.world_size
    }

    pub fn rendezvous(&self) -> &str {
        &self.rendezvous
    }

    /// Combines `buf` with the buffers of every other rank, leaving the result in `buf`.
    ///
    /// # Returns
    /// `CollectiveAborted` if the group was aborted before every rank arrived, or a size
    /// mismatch (which aborts the group) if the ranks disagree on the buffer's length.
    pub fn all_reduce(&self, buf: &mut [f32], op: ReduceOp) -> Result<()> {
        let mut state = self.state.lock();

        if state.aborted {
            return Err(ProofreaderError::CollectiveAborted);
        }

        if self.world_size == 1 {
            return Ok(());
        }

        if state.arrived == 0 {
            state.acc.clear();
            state.acc.extend_from_slice(buf);
        } else if state.acc.len() != buf.len() {
            let expected = state.acc.len();
            state.aborted = true;
            self.arrived.notify_all();
            return Err(MlErr::SizeMismatch {
                what: "all-reduce buffer",
                got: buf.len(),
                expected,
            }
            .into());
        } else {
            state.acc.iter_mut().zip(buf.iter()).for_each(|(acc, v)| *acc += v);
        }

        state.arrived += 1;

        if state.arrived == self.world_size {
            let scale = match op {
                ReduceOp::Sum => 1.,
                ReduceOp::Mean => 1. / self.world_size as f32,
            };

            let Collective { acc, result, .. } = &mut *state;
            result.clear();
            result.extend(acc.iter().map(|v| v * scale));

            state.arrived = 0;
            state.generation += 1;
            self.arrived.notify_all();
        } else {
            let generation = state.generation;

            while state.generation == generation && !state.aborted {
                self.arrived.wait(&mut state);
            }

            if state.generation == generation {
                return Err(ProofreaderError::CollectiveAborted);
            }
        }

        buf.copy_from_slice(&state.result);
        Ok(())
    }

    /// Blocks until every rank reaches the barrier.
    pub fn barrier(&self) -> Result<()> {
        self.all_reduce(&mut [], ReduceOp::Sum)
    }

    /// Fails every pending and future collective.
    pub fn abort(&self) {
        let mut state = self.state.lock();
        state.aborted = true;
        self.arrived.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }
}
