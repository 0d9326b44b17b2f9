/// Running sums of a logging interval.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IntervalAccumulator {
    loss: f64,
    accuracy: f64,
    steps: usize,
}

impl IntervalAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts for one step.
    pub fn add(&mut self, loss: f32, accuracy: f32) {
        self.loss += loss as f64;
        self.accuracy += accuracy as f64;
        self.steps += 1;
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// The mean (loss, accuracy) over the steps of the interval, if there were any.
    pub fn mean(&self) -> Option<(f32, f32)> {
        if self.steps == 0 {
            return None;
        }

        let n = self.steps as f64;
        Some(((self.loss / n) as f32, (self.accuracy / n) as f32))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Whether going from `prev` to `now` examples passed a multiple of `interval`.
pub fn crossed(prev: u64, now: u64, interval: u64) -> bool {
    interval > 0 && prev / interval != now / interval
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_over_steps() {
        let mut acc = IntervalAccumulator::new();
        assert_eq!(acc.mean(), None);

        acc.add(1., 0.5);
        acc.add(3., 1.);
        assert_eq!(acc.mean(), Some((2., 0.75)));

        acc.reset();
        assert_eq!(acc.steps(), 0);
    }

    #[test]
    fn interval_crossings() {
        assert!(crossed(192, 256, 200));
        assert!(crossed(196, 200, 200));
        assert!(!crossed(200, 256, 200));
        assert!(!crossed(0, 1000, 0));
    }
}
