use serde::{Deserialize, Serialize};

use super::Optimizer;
use crate::{MlErr, Result};

/// The mutable part of an `AdamW` optimizer, what a checkpoint has to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdamWState {
    pub step: u64,
    pub m: Vec<f32>,
    pub v: Vec<f32>,
}

/// Adam with decoupled weight decay.
#[derive(Debug, Clone)]
pub struct AdamW {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    state: AdamWState,
}

impl AdamW {
    /// Creates a new `AdamW` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `(beta1, beta2)`, `epsilon` - Hyperparameters of the moment estimates.
    /// * `weight_decay` - The decoupled decay applied to the parameters on every step.
    ///
    /// # Returns
    /// A new `AdamW` instance.
    pub fn new(
        len: usize,
        learning_rate: f32,
        (beta1, beta2): (f32, f32),
        epsilon: f32,
        weight_decay: f32,
    ) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            weight_decay,
            state: AdamWState {
                step: 0,
                m: vec![0.; len],
                v: vec![0.; len],
            },
        }
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn betas(&self) -> (f32, f32) {
        (self.beta1, self.beta2)
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn weight_decay(&self) -> f32 {
        self.weight_decay
    }

    pub fn len(&self) -> usize {
        self.state.m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.m.is_empty()
    }

    pub fn state(&self) -> &AdamWState {
        &self.state
    }

    /// Replaces the moment estimates, e.g. when resuming from a checkpoint.
    ///
    /// # Returns
    /// An error if the state doesn't hold exactly one moment per parameter.
    pub fn load_state(&mut self, state: AdamWState) -> Result<()> {
        let expected = self.len();

        for (what, got) in [("adamw m", state.m.len()), ("adamw v", state.v.len())] {
            if got != expected {
                return Err(MlErr::SizeMismatch {
                    what,
                    got,
                    expected,
                });
            }
        }

        self.state = state;
        Ok(())
    }
}

impl Optimizer for AdamW {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        let expected = self.len();

        for (what, got) in [("grad", grad.len()), ("params", params.len())] {
            if got != expected {
                return Err(MlErr::SizeMismatch {
                    what,
                    got,
                    expected,
                });
            }
        }

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            weight_decay: wd,
            ..
        } = *self;

        self.state.step += 1;
        let t = self.state.step as i32;
        let bc1 = 1. - b1.powi(t);
        let bc2_sqrt = (1. - b2.powi(t)).sqrt();
        let step_size = lr / bc1;
        let decay = 1. - lr * wd;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.state.m.iter_mut())
            .zip(self.state.v.iter_mut())
            .for_each(|(((p, g), m), v)| {
                *p *= decay;
                *m = b1 * *m + (1. - b1) * g;
                *v = b2 * *v + (1. - b2) * g.powi(2);
                *p -= step_size * *m / (v.sqrt() / bc2_sqrt + eps);
            });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_moves_by_learning_rate() {
        let mut opt = AdamW::new(2, 0.1, (0.9, 0.999), 1e-8, 0.);
        let mut params = [1., -1.];

        opt.update_params(&[0.5, -2.], &mut params).unwrap();

        // with bias correction the first step is lr * sign(g)
        assert!((params[0] - 0.9).abs() < 1e-5);
        assert!((params[1] + 0.9).abs() < 1e-5);
        assert_eq!(opt.state().step, 1);
    }

    #[test]
    fn weight_decay_shrinks_params_without_gradient() {
        let mut opt = AdamW::new(1, 0.1, (0.9, 0.999), 1e-8, 0.05);
        let mut params = [2.];

        opt.update_params(&[0.], &mut params).unwrap();
        assert!((params[0] - 2. * (1. - 0.1 * 0.05)).abs() < 1e-6);
    }

    #[test]
    fn mismatched_lengths_fail() {
        let mut opt = AdamW::new(2, 0.1, (0.9, 0.999), 1e-8, 0.05);
        assert!(opt.update_params(&[0.], &mut [0., 0.]).is_err());
        assert!(opt
            .load_state(AdamWState {
                step: 3,
                m: vec![0.],
                v: vec![0., 0.],
            })
            .is_err());
    }
}
