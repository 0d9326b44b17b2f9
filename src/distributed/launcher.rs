use std::{any::Any, sync::Arc, thread};

use log::{error, info};

use super::{DistContext, ProcessGroup, RENDEZVOUS};
use crate::{ProofreaderError, Result};

/// Aborts the group when the rank holding it unwinds.
struct AbortOnPanic(Arc<ProcessGroup>);

impl Drop for AbortOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panicked".to_string()
    }
}

/// Runs `f` once per rank, each on its own thread, and waits for all of them.
///
/// A failing rank aborts the group so its peers stop at their next collective.
///
/// # Arguments
/// * `world_size` - The amount of ranks.
/// * `f` - The body of a rank.
///
/// # Returns
/// The value of every rank in rank order, or the first error that is not a consequence of
/// another rank's failure.
pub fn launch<T, F>(world_size: usize, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(DistContext) -> Result<T> + Sync,
{
    let group = Arc::new(ProcessGroup::new(world_size, RENDEZVOUS));
    info!(
        world_size = group.world_size(),
        rendezvous = group.rendezvous();
        "launching ranks"
    );

    let outcomes = thread::scope(|s| {
        let mut handles = Vec::with_capacity(group.world_size());

        for rank in 0..group.world_size() {
            let ctx = DistContext::new(rank, Arc::clone(&group));
            let guard = AbortOnPanic(Arc::clone(&group));
            let f = &f;

            let spawned = thread::Builder::new()
                .name(format!("rank-{rank}"))
                .spawn_scoped(s, move || {
                    let guard = guard;
                    let result = f(ctx);
                    if let Err(e) = &result {
                        error!(rank = rank; "{e}");
                        guard.0.abort();
                    }
                    result
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    group.abort();
                    return Err(ProofreaderError::Io(e));
                }
            }
        }

        Ok(handles.into_iter().map(|h| h.join()).collect::<Vec<_>>())
    })?;

    let mut values = Vec::with_capacity(outcomes.len());
    let mut first_abort = None;
    let mut root_cause = None;

    for (rank, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(Ok(value)) => values.push(value),
            Ok(Err(ProofreaderError::CollectiveAborted)) => {
                first_abort.get_or_insert(ProofreaderError::CollectiveAborted);
            }
            Ok(Err(e)) => {
                root_cause.get_or_insert(e);
            }
            Err(payload) => {
                root_cause.get_or_insert(ProofreaderError::RankFailed {
                    rank,
                    msg: panic_message(payload.as_ref()),
                });
            }
        }
    }

    match root_cause.or(first_abort) {
        Some(e) => Err(e),
        None => Ok(values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_come_back_in_rank_order() {
        let ranks = launch(3, |ctx| Ok(ctx.rank() * 10)).unwrap();
        assert_eq!(ranks, [0, 10, 20]);
    }

    #[test]
    fn a_panicking_rank_is_reported() {
        let err = launch(2, |ctx| {
            if ctx.rank() == 1 {
                panic!("boom");
            }
            ctx.barrier()
        })
        .unwrap_err();

        assert!(matches!(
            err,
            ProofreaderError::RankFailed { rank: 1, ref msg } if msg == "boom"
        ));
    }
}
