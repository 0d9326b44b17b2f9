use std::f32::consts::TAU;

use ndarray::{Array2, Axis};
use rand::{Rng, seq::SliceRandom};
use rand_distr::{Distribution, Normal};

use crate::{ProofreaderError, Result, config::AugmentorConfig};

const SCALE_RANGE: (f32, f32) = (0.8, 1.2);
const JITTER_SIGMA: f32 = 0.01;
const JITTER_CLIP: f32 = 0.05;

/// Applies the configured transformations to `[num_points, 3]` clouds ordered (z, y, x).
///
/// Transformations run in a fixed order: center, normalize, rotate, scale, jitter and
/// finally shuffle. Normalization always runs.
#[derive(Debug, Clone)]
pub struct Augmentor {
    config: AugmentorConfig,
    jitter: Normal<f32>,
}

impl Augmentor {
    /// Creates a new `Augmentor`.
    ///
    /// # Returns
    /// The augmentor or `InvalidConfig` if a normalization divisor is zero.
    pub fn new(config: AugmentorConfig) -> Result<Self> {
        let (z, y, x) = config.normalize;
        if z == 0. || y == 0. || x == 0. {
            return Err(ProofreaderError::InvalidConfig(
                "normalize divisors must be non zero".to_string(),
            ));
        }

        let jitter = Normal::new(0., JITTER_SIGMA)
            .map_err(|e| ProofreaderError::InvalidConfig(e.to_string()))?;

        Ok(Self { config, jitter })
    }

    pub fn config(&self) -> &AugmentorConfig {
        &self.config
    }

    /// Transforms `points` in place.
    pub fn apply<R: Rng>(&self, rng: &mut R, points: &mut Array2<f32>) {
        if points.nrows() == 0 {
            return;
        }

        if self.config.center
            && let Some(centroid) = points.mean_axis(Axis(0))
        {
            *points -= &centroid;
        }

        let (z, y, x) = self.config.normalize;
        for mut p in points.rows_mut() {
            p[0] /= z;
            p[1] /= y;
            p[2] /= x;
        }

        if self.config.rotate {
            let (sin, cos) = rng.random_range(0.0..TAU).sin_cos();
            for mut p in points.rows_mut() {
                let (py, px) = (p[1], p[2]);
                p[1] = cos * py - sin * px;
                p[2] = sin * py + cos * px;
            }
        }

        if self.config.scale {
            let factor = rng.random_range(SCALE_RANGE.0..=SCALE_RANGE.1);
            *points *= factor;
        }

        if self.config.jitter {
            points.mapv_inplace(|v| v + self.jitter.sample(rng).clamp(-JITTER_CLIP, JITTER_CLIP));
        }

        if self.config.shuffle {
            let mut order: Vec<usize> = (0..points.nrows()).collect();
            order.shuffle(rng);
            *points = points.select(Axis(0), &order);
        }
    }
}
