use ndarray::prelude::*;

use crate::{MlErr, Result};

/// How a `GlobalPool` reduces the points of a cloud.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolMode {
    /// Channel-wise maximum, `C` output features.
    Max,
    /// Channel-wise maximum followed by the channel-wise mean, `2C` output features.
    MaxMean,
}

/// Symmetric reduction over the points of every cloud in a batch.
///
/// The input holds `batch * points` rows (the points of each cloud are contiguous) and
/// the output one row per cloud, which makes the network invariant to the order of
/// the points.
#[derive(Clone, Debug)]
pub struct GlobalPool {
    points: usize,
    mode: PoolMode,

    // Forward metadata
    argmax: Array2<usize>,
    channels: usize,
}

impl GlobalPool {
    /// Creates a new `GlobalPool`.
    ///
    /// # Arguments
    /// * `points` - The amount of points per cloud.
    /// * `mode` - The reduction to apply.
    pub fn new(points: usize, mode: PoolMode) -> Self {
        Self {
            points,
            mode,
            argmax: Array2::zeros((0, 0)),
            channels: 0,
        }
    }

    pub fn points(&self) -> usize {
        self.points
    }

    /// Returns the amount of output features for `channels` input features.
    pub fn out_features(&self, channels: usize) -> usize {
        match self.mode {
            PoolMode::Max => channels,
            PoolMode::MaxMean => 2 * channels,
        }
    }

    pub fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if self.points == 0 || x.nrows() % self.points != 0 {
            return Err(MlErr::SizeMismatch {
                what: "pooled rows",
                got: x.nrows(),
                expected: self.points,
            });
        }

        let batch = x.nrows() / self.points;
        let channels = x.ncols();
        let mut y = Array2::zeros((batch, self.out_features(channels)));
        let mut argmax = Array2::zeros((batch, channels));

        for (b, cloud) in x.axis_chunks_iter(Axis(0), self.points).enumerate() {
            for c in 0..channels {
                let column = cloud.column(c);
                let (idx, max) = column.iter().enumerate().fold(
                    (0, f32::NEG_INFINITY),
                    |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) },
                );

                y[[b, c]] = max;
                argmax[[b, c]] = idx;

                if self.mode == PoolMode::MaxMean {
                    y[[b, channels + c]] = column.sum() / self.points as f32;
                }
            }
        }

        self.argmax = argmax;
        self.channels = channels;
        Ok(y)
    }

    pub fn backward(&mut self, d: Array2<f32>) -> Result<Array2<f32>> {
        let batch = self.argmax.nrows();
        let channels = self.channels;

        if d.dim() != (batch, self.out_features(channels)) {
            return Err(MlErr::SizeMismatch {
                what: "pool delta",
                got: d.len(),
                expected: batch * self.out_features(channels),
            });
        }

        let mut dx = Array2::zeros((batch * self.points, channels));
        let inv_points = 1. / self.points as f32;

        for b in 0..batch {
            let base = b * self.points;

            for c in 0..channels {
                dx[[base + self.argmax[[b, c]], c]] += d[[b, c]];
            }

            if self.mode == PoolMode::MaxMean {
                for p in 0..self.points {
                    for c in 0..channels {
                        dx[[base + p, c]] += d[[b, channels + c]] * inv_points;
                    }
                }
            }
        }

        Ok(dx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_pool_picks_the_largest_point_per_channel() {
        let mut pool = GlobalPool::new(2, PoolMode::Max);
        let x = array![[1., 5.], [3., 2.], [0., 0.], [-1., 4.]];

        let y = pool.forward(x.view()).unwrap();
        assert_eq!(y, array![[3., 5.], [0., 4.]]);

        let dx = pool.backward(array![[1., 2.], [3., 4.]]).unwrap();
        assert_eq!(dx, array![[0., 2.], [1., 0.], [3., 0.], [0., 4.]]);
    }

    #[test]
    fn max_mean_pool_spreads_the_mean_gradient() {
        let mut pool = GlobalPool::new(2, PoolMode::MaxMean);
        let x = array![[1.], [3.]];

        let y = pool.forward(x.view()).unwrap();
        assert_eq!(y, array![[3., 2.]]);

        let dx = pool.backward(array![[1., 2.]]).unwrap();
        assert_eq!(dx, array![[1.], [2.]]);
    }

    #[test]
    fn rows_must_be_a_multiple_of_points() {
        let mut pool = GlobalPool::new(3, PoolMode::Max);
        assert!(pool.forward(Array2::zeros((4, 1)).view()).is_err());
    }
}
