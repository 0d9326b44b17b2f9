//! Training pipeline for point-cloud classifiers that proofread neuron segmentations.
//!
//! Samples are cut out of labelled electron microscopy volumes: a neurite is split by a
//! plane, a few slices around the plane are removed, and the classifier has to tell
//! whether both halves still belong to the same object or were falsely merged.

pub mod builder;
pub mod config;
pub mod data;
pub mod distributed;
mod error;
pub mod training;

pub use error::{DataError, ProofreaderError, Result};
