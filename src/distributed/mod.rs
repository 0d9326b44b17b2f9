//! Ranks of a data-parallel run and the collectives between them.

mod context;
mod group;
mod launcher;

pub use context::{DistContext, Leader};
pub use group::{ProcessGroup, RENDEZVOUS, ReduceOp};
pub use launcher::launch;
