use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::{MlErr, Result};

/// Fills `out` with samples of a uniform distribution in `[low, high)`.
///
/// # Arguments
/// * `rng` - A random number generator.
/// * `low` - The inclusive lower limit.
/// * `high` - The exclusive upper limit.
/// * `out` - Where to write the samples.
///
/// # Returns
/// An error if the range is invalid (low >= high or not finite).
pub fn uniform<R: Rng>(rng: &mut R, low: f32, high: f32, out: &mut [f32]) -> Result<()> {
    let distribution =
        Uniform::new(low, high).map_err(|_| MlErr::InvalidInput("invalid uniform range"))?;

    out.iter_mut()
        .for_each(|w| *w = distribution.sample(&mut *rng));

    Ok(())
}

/// Fills `out` using Kaiming (He) uniform initialization for relu networks,
/// that is, `U(-b, b)` with `b = sqrt(6 / fan_in)`.
///
/// # Arguments
/// * `rng` - A random number generator.
/// * `fan_in` - The number of input units of the weight matrix.
/// * `out` - Where to write the weights.
///
/// # Returns
/// An error if `fan_in` is zero.
pub fn kaiming_uniform<R: Rng>(rng: &mut R, fan_in: usize, out: &mut [f32]) -> Result<()> {
    if fan_in == 0 {
        return Err(MlErr::InvalidInput("fan_in must be positive"));
    }

    let bound = (6. / fan_in as f32).sqrt();
    uniform(rng, -bound, bound, out)
}
