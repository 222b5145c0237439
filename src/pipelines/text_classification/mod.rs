/// Run artifacts shared by training and inference
pub mod artifacts;

/// Batch generation and tensor batching
pub mod batcher;

/// Text Classification Items
pub mod item;

/// Training
pub mod training;

/// Inference
pub mod inference;

pub use batcher::{Batch, BatchGenerator, Batcher};
pub use inference::{infer, Prediction};
pub use item::Example;
pub use training::{train, TrainingSummary};
