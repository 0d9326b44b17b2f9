use std::time::Instant;

use log::{debug, info};

/// Reports how far along the run is.
#[derive(Debug)]
pub struct Progress {
    epochs: usize,
    epoch: usize,
    batches: usize,
    done: usize,
    started: Instant,
    epoch_started: Instant,
}

impl Progress {
    pub fn new(epochs: usize) -> Self {
        let now = Instant::now();

        Self {
            epochs,
            epoch: 0,
            batches: 0,
            done: 0,
            started: now,
            epoch_started: now,
        }
    }

    pub fn start_epoch(&mut self, epoch: usize, batches: usize) {
        self.epoch = epoch;
        self.batches = batches;
        self.done = 0;
        self.epoch_started = Instant::now();
        info!("epoch {}/{} ({batches} batches)", epoch + 1, self.epochs);
    }

    pub fn advance(&mut self) {
        self.done += 1;
        debug!(epoch = self.epoch, batch = self.done, batches = self.batches; "batch done");
    }

    pub fn end_epoch(&self) {
        info!(
            "epoch {}/{} done in {:.1?}",
            self.epoch + 1,
            self.epochs,
            self.epoch_started.elapsed()
        );
    }

    pub fn finish(&self) {
        info!("training done in {:.1?}", self.started.elapsed());
    }
}
