use std::ops::Range;

use machine_learning::{
    arch::{
        PointCloudClassifier,
        loss::{Criterion, LossFn},
    },
    metrics::{predict_class, total_accuracy},
};
use ndarray::{Array2, ArrayView2, s};
use rayon::prelude::*;

use crate::{Result, data::Batch};

/// Loss and accuracy of a single batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepStats {
    pub loss: f32,
    pub accuracy: f32,
}

/// Splits `total` samples among `parts` and returns the contiguous share of `part`.
///
/// Shares differ by at most one sample.
pub fn shard_range(total: usize, part: usize, parts: usize) -> Range<usize> {
    let base = total / parts;
    let rem = total % parts;

    let start = part * base + part.min(rem);
    let extra = usize::from(part < rem);
    start..start + base + extra
}

/// Copies of a model sharing one parameter vector, each running a slice of every batch.
///
/// The outputs of every slice are gathered before the loss, so the loss and its
/// derivative are those of the whole batch whatever the amount of replicas.
#[derive(Debug, Clone)]
pub struct Replicas {
    models: Vec<PointCloudClassifier>,
}

impl Replicas {
    /// Creates `count` replicas of `model`, at least one.
    pub fn new(model: PointCloudClassifier, count: usize) -> Self {
        Self {
            models: vec![model; count.max(1)],
        }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn model(&self) -> &PointCloudClassifier {
        &self.models[0]
    }

    /// Computes the gradient of the batch's mean loss, **accumulating** it into `grad`.
    ///
    /// # Arguments
    /// * `params` - The shared parameters.
    /// * `grad` - The shared gradient buffer.
    /// * `batch` - The batch to learn from.
    /// * `criterion` - The loss.
    pub fn train_step(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        batch: &Batch,
        criterion: &Criterion,
    ) -> Result<StepStats> {
        let total = batch.len();
        let parts = self.parts(total);
        let y = self.forward(params, batch, parts)?;
        let stats = stats(y.view(), batch, criterion)?;
        let d = criterion.loss_prime(y.view(), &batch.labels)?;

        let grads = self.models[..parts]
            .par_iter_mut()
            .enumerate()
            .map(|(part, model)| -> Result<Vec<f32>> {
                let rows = shard_range(total, part, parts);
                let mut share = vec![0.; params.len()];
                model.backward(params, &mut share, d.slice(s![rows, ..]).to_owned())?;
                Ok(share)
            })
            .collect::<Result<Vec<_>>>()?;

        for share in &grads {
            grad.iter_mut().zip(share).for_each(|(g, s)| *g += s);
        }

        Ok(stats)
    }

    /// Computes the batch's loss and accuracy without any gradient.
    pub fn evaluate(
        &mut self,
        params: &[f32],
        batch: &Batch,
        criterion: &Criterion,
    ) -> Result<StepStats> {
        let parts = self.parts(batch.len());
        let y = self.forward(params, batch, parts)?;
        stats(y.view(), batch, criterion)
    }

    fn parts(&self, total: usize) -> usize {
        self.models.len().min(total).max(1)
    }

    /// Runs every slice of the batch on its replica and gathers the outputs, `[batch, classes]`.
    fn forward(&mut self, params: &[f32], batch: &Batch, parts: usize) -> Result<Array2<f32>> {
        let total = batch.len();
        let outputs = self.models[..parts]
            .par_iter_mut()
            .enumerate()
            .map(|(part, model)| -> Result<Array2<f32>> {
                let rows = shard_range(total, part, parts);
                let clouds = batch.clouds.slice(s![rows, .., ..]);
                Ok(model.forward(params, clouds)?)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut y = Array2::zeros((total, self.model().num_classes()));
        for (part, output) in outputs.iter().enumerate() {
            let rows = shard_range(total, part, parts);
            y.slice_mut(s![rows, ..]).assign(output);
        }

        Ok(y)
    }
}

fn stats(y: ArrayView2<f32>, batch: &Batch, criterion: &Criterion) -> Result<StepStats> {
    let loss = criterion.loss(y, &batch.labels)?;
    let predictions = predict_class(y);

    Ok(StepStats {
        loss,
        accuracy: total_accuracy(&batch.labels, &predictions),
    })
}

#[cfg(test)]
mod tests {
    use machine_learning::arch::loss::Nll;
    use ndarray::Array3;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn shard_range_balanced() {
        assert_eq!(shard_range(10, 0, 3), 0..4);
        assert_eq!(shard_range(10, 1, 3), 4..7);
        assert_eq!(shard_range(10, 2, 3), 7..10);
    }

    fn assert_replicas_match(batch: &Batch, criterion: &Criterion, count: usize) {
        let model = PointCloudClassifier::pointnet(6, 8, 2).unwrap();
        let params = model.init_params(&mut StdRng::seed_from_u64(2)).unwrap();

        let mut one = Replicas::new(model.clone(), 1);
        let mut grad_one = vec![0.; params.len()];
        let a = one.train_step(&params, &mut grad_one, batch, criterion).unwrap();

        let mut many = Replicas::new(model, count);
        let mut grad_many = vec![0.; params.len()];
        let b = many.train_step(&params, &mut grad_many, batch, criterion).unwrap();

        assert!((a.loss - b.loss).abs() < 1e-5);
        assert_eq!(a.accuracy, b.accuracy);
        for (x, y) in grad_one.iter().zip(&grad_many) {
            assert!((x - y).abs() < 1e-4);
        }

        let eval = many.evaluate(&params, batch, criterion).unwrap();
        assert!((a.loss - eval.loss).abs() < 1e-5);
    }

    fn batch(labels: Vec<usize>) -> Batch {
        Batch {
            clouds: Array3::from_shape_fn((labels.len(), 6, 3), |(b, p, c)| {
                ((b * 7 + p * 3 + c) as f32).cos()
            }),
            labels,
        }
    }

    #[test]
    fn replicas_match_a_single_model() {
        let criterion = Criterion::Nll(Nll::new());
        assert_replicas_match(&batch(vec![0, 1, 1, 0, 1]), &criterion, 3);
    }

    #[test]
    fn replicas_match_a_single_model_with_class_weights() {
        let criterion = Criterion::Nll(Nll::weighted(vec![1., 5.]));
        assert_replicas_match(&batch(vec![0, 0, 0, 1]), &criterion, 2);
        assert_replicas_match(&batch(vec![0, 0, 0, 1, 0]), &criterion, 3);
    }
}
