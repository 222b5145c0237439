use std::fmt::Display;

use super::{Checkpointer, Config, StepMetrics, StepModel, SummaryRecord, SummaryWriter};
use crate::{error::Result, pipelines::text_classification::batcher::Batch};

/// Progress of the training loop
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrainingState {
    /// The last step reported by the model
    pub current_step: usize,

    /// The best per-batch training accuracy seen so far
    pub best_accuracy: f64,

    /// The step at which `best_accuracy` was reached
    pub last_improvement_step: usize,
}

impl TrainingState {
    /// State for a run resumed from a snapshot taken at `step`
    pub fn resumed(step: usize) -> Self {
        Self {
            current_step: step,
            best_accuracy: 0.0,
            last_improvement_step: step,
        }
    }
}

/// Why the loop stopped consuming batches
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// No accuracy improvement for more than the allowed number of steps
    Plateau,

    /// A batch was classified perfectly
    PerfectAccuracy,

    /// Every batch was consumed
    Exhausted,
}

impl Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            StopReason::Plateau => "no improvement found in a while",
            StopReason::PerfectAccuracy => "reached perfect training accuracy",
            StopReason::Exhausted => "all epochs completed",
        };

        write!(f, "{}", reason)
    }
}

/// What a finished loop reports
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Outcome {
    /// The final state
    pub state: TrainingState,

    /// Why the loop stopped
    pub reason: StopReason,

    /// The step of the last snapshot, which is always the final step
    pub final_checkpoint: usize,
}

/// Drives a [StepModel] over a batch stream, checkpointing on a fixed cadence and stopping early
/// on an accuracy plateau or on perfect accuracy
#[derive(Debug)]
pub struct TrainingLoop {
    checkpoint_every: usize,
    print_loss: usize,
    patience: usize,
    state: TrainingState,
    last_checkpoint: Option<usize>,
    summary: Option<SummaryWriter>,
}

impl TrainingLoop {
    /// A loop for a training set of `train_size` examples
    pub fn new(config: &Config, train_size: usize) -> Self {
        let iterations_per_epoch = iterations_per_epoch(train_size, config.batch_size);

        Self {
            checkpoint_every: config.checkpoint_every.max(1),
            print_loss: config.print_loss.max(1),
            patience: config.require_improvement * iterations_per_epoch,
            state: TrainingState::default(),
            last_checkpoint: None,
            summary: None,
        }
    }

    /// Continue from a snapshot taken at `step`
    pub fn resume(mut self, step: usize) -> Self {
        self.state = TrainingState::resumed(step);
        self
    }

    /// Append every step's metrics to `summary`
    pub fn with_summary(mut self, summary: SummaryWriter) -> Self {
        self.summary = Some(summary);
        self
    }

    /// Steps without improvement tolerated before stopping
    pub fn patience(&self) -> usize {
        self.patience
    }

    /// The current state
    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    /// Fold one step's metrics into the state and decide whether to stop
    pub fn observe(&mut self, metrics: StepMetrics) -> Option<StopReason> {
        let step = metrics.step;
        self.state.current_step = step;

        if metrics.accuracy > self.state.best_accuracy {
            self.state.best_accuracy = metrics.accuracy;
            self.state.last_improvement_step = step;
        }

        if step.saturating_sub(self.state.last_improvement_step) > self.patience {
            Some(StopReason::Plateau)
        } else if self.state.best_accuracy >= 1.0 {
            Some(StopReason::PerfectAccuracy)
        } else {
            None
        }
    }

    /// Train until the batches run out or a stop condition holds, then take a final snapshot
    /// unless one was already taken at the last step
    pub fn run<M, C>(
        mut self,
        model: &mut M,
        batches: impl IntoIterator<Item = Batch>,
        checkpointer: &mut C,
    ) -> Result<Outcome>
    where
        M: StepModel,
        C: Checkpointer<M>,
    {
        let mut reason = StopReason::Exhausted;

        for batch in batches {
            let metrics = model.train_step(&batch);
            let step = metrics.step;

            if let Some(summary) = self.summary.as_mut() {
                summary.write(SummaryRecord::new(
                    step,
                    metrics.loss,
                    metrics.accuracy,
                    Some(metrics.learning_rate),
                ))?;
            }

            if step % self.checkpoint_every == 0 {
                checkpointer.checkpoint(model, step)?;
                self.last_checkpoint = Some(step);
            }

            let stop = self.observe(metrics);

            if step % self.print_loss == 0 {
                log::info!(
                    "Epoch {}, step {}, loss {:.4}, accuracy {:.4}",
                    batch.epoch,
                    step,
                    metrics.loss,
                    metrics.accuracy
                );
            }

            if let Some(stop) = stop {
                log::info!(
                    "Stopping at step {step}: {stop}. Best accuracy {:.4} at step {}",
                    self.state.best_accuracy,
                    self.state.last_improvement_step
                );

                reason = stop;
                break;
            }
        }

        let final_step = self.state.current_step;

        if self.last_checkpoint != Some(final_step) {
            checkpointer.checkpoint(model, final_step)?;
            self.last_checkpoint = Some(final_step);
        }

        Ok(Outcome {
            state: self.state,
            reason,
            final_checkpoint: final_step,
        })
    }
}

/// Batches per epoch: `ceil(train_size / batch_size)`
pub fn iterations_per_epoch(train_size: usize, batch_size: usize) -> usize {
    train_size.div_ceil(batch_size.max(1))
}
