mod criterion;
mod cross_entropy;
mod loss_fn;
mod nll;

pub use criterion::Criterion;
pub use cross_entropy::CrossEntropy;
pub use loss_fn::LossFn;
pub use nll::Nll;

use crate::{MlErr, Result};

/// Validates the targets of a batch and returns the weight of each of them along with
/// their sum.
fn target_weights(
    weights: Option<&[f32]>,
    classes: usize,
    targets: &[usize],
    rows: usize,
) -> Result<(Vec<f32>, f32)> {
    if targets.len() != rows {
        return Err(MlErr::SizeMismatch {
            what: "targets",
            got: targets.len(),
            expected: rows,
        });
    }

    if targets.is_empty() {
        return Err(MlErr::InvalidInput("empty batch"));
    }

    if let Some(w) = weights
        && w.len() != classes
    {
        return Err(MlErr::SizeMismatch {
            what: "class weights",
            got: w.len(),
            expected: classes,
        });
    }

    if targets.iter().any(|&t| t >= classes) {
        return Err(MlErr::InvalidInput("target class out of range"));
    }

    let per_target: Vec<f32> = match weights {
        Some(w) => targets.iter().map(|&t| w[t]).collect(),
        None => vec![1.; targets.len()],
    };

    let total: f32 = per_target.iter().sum();
    if total <= 0. {
        return Err(MlErr::InvalidInput("target weights must add up to a positive value"));
    }

    Ok((per_target, total))
}
