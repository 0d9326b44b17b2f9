use ndarray::{ArrayView2, Axis};

/// Returns the most likely class of every row.
pub fn predict_class(y_pred: ArrayView2<f32>) -> Vec<usize> {
    y_pred
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(bi, bv), (i, &v)| {
                    if v > bv { (i, v) } else { (bi, bv) }
                })
                .0
        })
        .collect()
}

/// Returns the fraction of predictions that match their target, `0.0` for an empty batch.
pub fn total_accuracy(targets: &[usize], predictions: &[usize]) -> f32 {
    if targets.is_empty() {
        return 0.;
    }

    let hits = targets
        .iter()
        .zip(predictions)
        .filter(|(t, p)| t == p)
        .count();

    hits as f32 / targets.len() as f32
}
