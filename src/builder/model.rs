use machine_learning::{
    arch::{
        Backbone, PointCloudClassifier,
        loss::{Criterion, CrossEntropy, Nll},
    },
    optimization::AdamW,
};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    ProofreaderError, Result,
    config::{DatasetConfig, ModelConfig},
};

pub const ADAMW_BETAS: (f32, f32) = (0.9, 0.999);
pub const ADAMW_EPSILON: f32 = 1e-8;
pub const ADAMW_WEIGHT_DECAY: f32 = 0.05;

/// The losses a model can be trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossKind {
    /// Negative log-likelihood over the model's log-probabilities.
    Nll,
    /// Cross entropy, `bce` being its two class case.
    CrossEntropy,
}

impl LossKind {
    pub fn parse(kind: &str) -> Result<Self> {
        match kind {
            "nll" => Ok(LossKind::Nll),
            "ce" | "bce" => Ok(LossKind::CrossEntropy),
            _ => Err(unsupported("loss", kind)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    AdamW,
}

impl OptimizerKind {
    pub fn parse(kind: &str) -> Result<Self> {
        match kind {
            "AdamW" => Ok(OptimizerKind::AdamW),
            _ => Err(unsupported("optimizer", kind)),
        }
    }
}

pub fn parse_backbone(kind: &str) -> Result<Backbone> {
    match kind {
        "pointnet" => Ok(Backbone::PointNet),
        "curvenet" => Ok(Backbone::CurveNet),
        _ => Err(unsupported("model", kind)),
    }
}

fn unsupported(what: &'static str, got: &str) -> ProofreaderError {
    ProofreaderError::UnsupportedKind {
        what,
        got: got.to_string(),
    }
}

/// Builds a classifier, its loss, its optimizer and its initial parameters.
///
/// # Arguments
/// * `model_config` - Backbone, loss and optimizer kinds plus their hyperparameters.
/// * `dataset_config` - Fixes the amount of points per cloud.
/// * `seed` - Seeds the parameter initialization.
///
/// # Returns
/// The pieces of the model or `UnsupportedKind` on any unknown kind.
pub fn build_full_model_from_config(
    model_config: &ModelConfig,
    dataset_config: &DatasetConfig,
    seed: u64,
) -> Result<(PointCloudClassifier, Criterion, AdamW, Vec<f32>)> {
    let model = resolve_backbone(model_config, dataset_config)?;
    let criterion = resolve_loss(model_config)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let params = model.init_params(&mut rng)?;
    let optimizer = resolve_optimizer(model_config, params.len())?;

    Ok((model, criterion, optimizer, params))
}

fn resolve_backbone(
    model_config: &ModelConfig,
    dataset_config: &DatasetConfig,
) -> Result<PointCloudClassifier> {
    let backbone = parse_backbone(&model_config.model)?;
    let model = PointCloudClassifier::new(
        backbone,
        dataset_config.num_points,
        model_config.dim,
        model_config.num_classes,
    )?;
    Ok(model)
}

fn resolve_loss(model_config: &ModelConfig) -> Result<Criterion> {
    let kind = LossKind::parse(&model_config.loss)?;

    let weights = match &model_config.class_weights {
        Some(weights) if weights.len() != model_config.num_classes => {
            return Err(ProofreaderError::InvalidConfig(format!(
                "{} class weights for {} classes",
                weights.len(),
                model_config.num_classes
            )));
        }
        weights => weights.clone(),
    };

    let criterion = match (kind, weights) {
        (LossKind::Nll, None) => Criterion::Nll(Nll::new()),
        (LossKind::Nll, Some(w)) => Criterion::Nll(Nll::weighted(w)),
        (LossKind::CrossEntropy, None) => Criterion::CrossEntropy(CrossEntropy::new()),
        (LossKind::CrossEntropy, Some(w)) => Criterion::CrossEntropy(CrossEntropy::weighted(w)),
    };

    Ok(criterion)
}

fn resolve_optimizer(model_config: &ModelConfig, len: usize) -> Result<AdamW> {
    match OptimizerKind::parse(&model_config.optimizer)? {
        OptimizerKind::AdamW => Ok(AdamW::new(
            len,
            model_config.learning_rate,
            ADAMW_BETAS,
            ADAMW_EPSILON,
            ADAMW_WEIGHT_DECAY,
        )),
    }
}
