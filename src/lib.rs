//! # Burn Text Classifier
//!
//! CNN and LSTM text classifiers over pretrained word embeddings, with a training loop that
//! checkpoints on a fixed cadence and stops early when training accuracy plateaus.
#![forbid(unsafe_code)]

/// Backend selection
pub mod backend;

/// CLI argument parsing
pub mod cli;

/// Datasets
pub mod datasets;

/// Errors
pub mod error;

/// Models
pub mod models;

/// Pipelines
pub mod pipelines;

/// Training
pub mod training;

/// Utilities
pub mod utils;

pub use error::{Error, Result};
