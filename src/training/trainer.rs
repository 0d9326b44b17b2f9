use std::{path::PathBuf, sync::Arc};

use log::{debug, info, warn};
use machine_learning::{
    arch::loss::Criterion,
    optimization::{AdamW, Optimizer},
};

use super::{Checkpoint, IntervalAccumulator, Replicas, RunOutput, TrainOptions, crossed};
use crate::{
    Result,
    builder::{build_dataloaders, build_dataset_from_config, build_full_model_from_config},
    config::{ExperimentConfig, get_config},
    data::{DataLoader, SplitterDataset, Subset, Volume, prepare_volumes, synthetic_volumes},
    distributed::{DistContext, launch},
};

/// Shape of every generated volume, (z, y, x).
pub const SYNTHETIC_SHAPE: (usize, usize, usize) = (24, 64, 64);

/// What a rank ends a run with.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub rank: usize,
    pub params: Vec<f32>,
    pub example_number: u64,
    /// The run's output directory, only known to rank 0.
    pub run_dir: Option<PathBuf>,
}

/// Trains the experiment named by `options`, returning the outcome of every rank.
pub fn run(options: &TrainOptions) -> Result<Vec<RunOutcome>> {
    let config = get_config(&options.config)?;

    let volumes = match options.synthetic {
        Some(count) => synthetic_volumes(count, SYNTHETIC_SHAPE, options.seed),
        None => {
            let path = config.dataset.path.as_deref().unwrap_or(&options.path);
            prepare_volumes(path)?
        }
    };

    run_with(options, config, volumes.into())
}

/// Trains `config` on `volumes`, spawning one rank per device under ddp.
pub fn run_with(
    options: &TrainOptions,
    config: &ExperimentConfig,
    volumes: Arc<[Volume]>,
) -> Result<Vec<RunOutcome>> {
    // ranks must agree on the seed even when it isn't the configured one
    let seed = if config.trainer.deterministic {
        options.seed
    } else {
        rand::random()
    };

    info!(
        config = config.name.as_str(),
        seed = seed,
        world_size = options.world_size(),
        replicas = options.replicas();
        "starting run"
    );

    launch(options.world_size(), |ctx| {
        Trainer::new(ctx, options, config, Arc::clone(&volumes), seed)?.fit()
    })
}

/// The loop of a single rank.
struct Trainer<'a> {
    ctx: DistContext,
    options: &'a TrainOptions,
    criterion: Criterion,
    optimizer: AdamW,
    params: Vec<f32>,
    grad: Vec<f32>,
    replicas: Replicas,
    train_loader: DataLoader<Subset<SplitterDataset>>,
    val_loader: DataLoader<Subset<SplitterDataset>>,
    output: Option<RunOutput>,
    interval: IntervalAccumulator,
    example_number: u64,
    start_epoch: usize,
}

impl<'a> Trainer<'a> {
    fn new(
        ctx: DistContext,
        options: &'a TrainOptions,
        config: &ExperimentConfig,
        volumes: Arc<[Volume]>,
        seed: u64,
    ) -> Result<Self> {
        let (train, val) =
            build_dataset_from_config(&config.dataset, &config.augmentor, volumes, seed)?;

        let batch_size = options.batch_size.unwrap_or(config.dataset.batch_size);
        let workers = options.workers();
        debug!(rank = ctx.rank(), workers = workers, batch_size = batch_size; "loaders");
        let (train_loader, val_loader) =
            build_dataloaders(train, val, batch_size, workers, &ctx, seed)?;

        let (model, criterion, mut optimizer, mut params) =
            build_full_model_from_config(&config.model, &config.dataset, seed)?;

        let mut example_number = 0;
        let mut start_epoch = 0;
        if let Some(path) = &options.load {
            let checkpoint = Checkpoint::load(path)?;
            start_epoch = checkpoint.epoch + 1;
            example_number = checkpoint.example_number;
            checkpoint.restore(&mut params, &mut optimizer)?;
            info!(rank = ctx.rank(), epoch = start_epoch; "resumed from {}", path.display());
        }

        let output = ctx
            .leader()
            .map(|leader| RunOutput::create(leader, options, config))
            .transpose()?;

        Ok(Self {
            grad: vec![0.; params.len()],
            replicas: Replicas::new(model, options.replicas()),
            ctx,
            options,
            criterion,
            optimizer,
            params,
            train_loader,
            val_loader,
            output,
            interval: IntervalAccumulator::new(),
            example_number,
            start_epoch,
        })
    }

    fn fit(mut self) -> Result<RunOutcome> {
        if self.train_loader.is_empty() {
            warn!(rank = self.ctx.rank(); "not a single full training batch per epoch");
        }

        for epoch in self.start_epoch..self.options.epochs {
            self.train_epoch(epoch)?;
            self.validate()?;
            self.checkpoint(epoch)?;

            if let Some(output) = &mut self.output {
                output.progress().end_epoch();
            }
        }

        let run_dir = self.output.map(RunOutput::finish).transpose()?;

        Ok(RunOutcome {
            rank: self.ctx.rank(),
            params: self.params,
            example_number: self.example_number,
            run_dir,
        })
    }

    fn train_epoch(&mut self, epoch: usize) -> Result<()> {
        self.train_loader.set_epoch(epoch as u64);

        if let Some(output) = &mut self.output {
            output.progress().start_epoch(epoch, self.train_loader.len());
        }

        let indices = self.train_loader.indices();
        for chunk in indices.chunks_exact(self.train_loader.batch_size()) {
            let batch = self.train_loader.fetch(chunk)?;

            self.grad.fill(0.);
            let stats = self.replicas.train_step(
                &self.params,
                &mut self.grad,
                &batch,
                &self.criterion,
            )?;

            if self.ctx.is_distributed() {
                self.ctx.all_reduce_mean(&mut self.grad)?;
            }
            self.optimizer.update_params(&self.grad, &mut self.params)?;
            self.interval.add(stats.loss, stats.accuracy);

            let prev = self.example_number;
            self.example_number += (batch.len() * self.ctx.world_size()) as u64;

            if crossed(prev, self.example_number, self.options.training_interval) {
                if let Some(output) = &mut self.output
                    && let Some((loss, accuracy)) = self.interval.mean()
                {
                    output.log_train(loss, accuracy, self.example_number)?;
                }
                self.interval.reset();
            }

            if let Some(output) = &mut self.output {
                output.progress().advance();
            }

            if crossed(prev, self.example_number, self.options.validation_interval) {
                self.validate()?;
            }
        }

        Ok(())
    }

    /// Runs the validation set through the model without touching the parameters.
    ///
    /// Every rank takes part, rank 0 logs the mean over the batches of all of them.
    fn validate(&mut self) -> Result<()> {
        let mut sums = [0f32; 3];

        for batch in self.val_loader.iter() {
            let batch = batch?;
            let stats = self
                .replicas
                .evaluate(&self.params, &batch, &self.criterion)?;
            sums[0] += stats.loss;
            sums[1] += stats.accuracy;
            sums[2] += 1.;
        }

        if self.ctx.is_distributed() {
            self.ctx.all_reduce_sum(&mut sums)?;
        }

        let [loss, accuracy, batches] = sums;
        if batches == 0. {
            debug!("no validation batches");
            return Ok(());
        }

        if let Some(output) = &mut self.output {
            output.log_valid(loss / batches, accuracy / batches, self.example_number)?;
        }

        Ok(())
    }

    fn checkpoint(&mut self, epoch: usize) -> Result<()> {
        let Some(output) = &mut self.output else {
            return Ok(());
        };

        let checkpoint = Checkpoint {
            epoch,
            example_number: self.example_number,
            params: self.params.clone(),
            optimizer: self.optimizer.state().clone(),
        };

        output.save_checkpoint(&checkpoint)?;
        Ok(())
    }
}
