use derive_new::new;

use crate::{error::Result, pipelines::text_classification::batcher::Batch};

/// Experiment configuration
pub mod config;

/// Snapshot persistence and retention
pub mod checkpoint;

/// The held-out evaluation pass
pub mod evaluation;

/// Model, optimizer and global step
pub mod session;

/// Per-step metric streams
pub mod summary;

/// The training loop state machine
pub mod trainer;

pub use checkpoint::CheckpointManager;
pub use config::{parse_filter_sizes, Config, EmbeddingMode};
pub use evaluation::{EvaluationPass, EvaluationReport};
pub use session::Session;
pub use summary::{SummaryRecord, SummaryWriter};
pub use trainer::{Outcome, StopReason, TrainingLoop, TrainingState};

/// Scalars reported by one training step
#[derive(Clone, Copy, Debug, PartialEq, new)]
pub struct StepMetrics {
    /// The global step after the update
    pub step: usize,

    /// Mean loss over the batch
    pub loss: f64,

    /// Fraction of the batch classified correctly
    pub accuracy: f64,

    /// The learning rate the update was applied with
    pub learning_rate: f64,
}

/// Output of one inference batch
#[derive(Clone, Debug, PartialEq, new)]
pub struct Evaluation {
    /// Predicted class index per example
    pub predictions: Vec<usize>,

    /// Mean loss over the batch
    pub loss: f64,

    /// Number of correct predictions
    pub correct: usize,
}

/// A model that learns from one batch at a time and owns the global step
pub trait StepModel {
    /// Run one optimization step
    fn train_step(&mut self, batch: &Batch) -> StepMetrics;

    /// Number of optimization steps taken so far
    fn global_step(&self) -> usize;
}

/// A model that classifies a batch without learning from it
pub trait EvalModel {
    /// Classify a batch with dropout disabled
    fn evaluate(&self, batch: &Batch) -> Evaluation;
}

/// Persists snapshots of a model
pub trait Checkpointer<M> {
    /// Save `model` as the snapshot for `step`
    fn checkpoint(&mut self, model: &M, step: usize) -> Result<()>;
}
