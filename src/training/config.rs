use std::{fmt::Display, path::PathBuf};

use burn::LearningRate;
use serde::{Deserialize, Serialize};

use crate::{error::Error, models::Architecture};

/// Policy for loading the pretrained word vectors and whether they keep training
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
    /// Randomly initialized, trainable
    Random,

    /// Pretrained and frozen
    Static,

    /// Pretrained and fine-tuned
    Trainable,

    /// One frozen and one fine-tuned pretrained channel
    DualChannel,
}

impl EmbeddingMode {
    /// Whether this mode needs the pretrained table
    pub fn uses_pretrained(&self) -> bool {
        !matches!(self, EmbeddingMode::Random)
    }
}

impl TryFrom<&str> for EmbeddingMode {
    type Error = Error;

    fn try_from(value: &str) -> crate::error::Result<Self> {
        match value.to_lowercase().as_str() {
            "rand" | "random" => Ok(EmbeddingMode::Random),
            "static" => Ok(EmbeddingMode::Static),
            "non_static" | "trainable" => Ok(EmbeddingMode::Trainable),
            "multiple_channels" | "dual_channel" | "dual-channel" => {
                Ok(EmbeddingMode::DualChannel)
            }
            other => Err(Error::Configuration(format!(
                "unknown embedding mode {other}"
            ))),
        }
    }
}

impl Display for EmbeddingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EmbeddingMode::Random => "random",
            EmbeddingMode::Static => "static",
            EmbeddingMode::Trainable => "trainable",
            EmbeddingMode::DualChannel => "dual_channel",
        };

        write!(f, "{}", name)
    }
}

/// Define configuration struct for the experiment
#[derive(burn::config::Config, Debug)]
pub struct Config {
    /// The directory holding the numbered CSV files
    #[config(default = "\"data\".to_string()")]
    pub data_dir: String,

    /// The root directory for checkpoints and run artifacts
    #[config(default = "\"logs\".to_string()")]
    pub checkpoint_dir: String,

    /// Pretrained embeddings in whitespace separated text form
    pub embedding_file: Option<String>,

    /// Index of the held-out file; files before it are used for training
    #[config(default = 1)]
    pub train_index: usize,

    /// Header of the text column
    #[config(default = "\"text\".to_string()")]
    pub text_column: String,

    /// Header of the label column
    #[config(default = "\"label\".to_string()")]
    pub label_column: String,

    /// The classifier architecture
    #[config(default = "Architecture::TextBiLstm")]
    pub architecture: Architecture,

    /// Dimensionality of the word embeddings
    #[config(default = 300)]
    pub embedding_dim: usize,

    /// Convolution filter widths
    #[config(default = "vec![3]")]
    pub filter_sizes: Vec<usize>,

    /// Number of filters per filter size
    #[config(default = 100)]
    pub num_filters: usize,

    /// Size of the recurrent hidden state
    #[config(default = 300)]
    pub hidden_size: usize,

    /// Dropout keep probability during training
    #[config(default = 0.5)]
    pub dropout_keep_prob: f64,

    /// L2 regularization strength
    #[config(default = 0.0)]
    pub l2_reg_lambda: f64,

    /// Initial learning rate
    #[config(default = 1e-4)]
    pub learning_rate: LearningRate,

    /// Learning rate decay applied once per epoch
    #[config(default = 0.96)]
    pub decay_rate: f64,

    /// Batch size
    #[config(default = 100)]
    pub batch_size: usize,

    /// Number of epochs
    #[config(default = 200)]
    pub num_epochs: usize,

    /// Epochs without a better training accuracy before stopping
    #[config(default = 10)]
    pub require_improvement: usize,

    /// Reporting cadence of the evaluation pass
    #[config(default = 500)]
    pub evaluate_every: usize,

    /// Reporting cadence of the training loop
    #[config(default = 200)]
    pub print_loss: usize,

    /// Save a checkpoint after this many steps
    #[config(default = 300)]
    pub checkpoint_every: usize,

    /// Number of checkpoints to retain
    #[config(default = 5)]
    pub num_checkpoints_kept: usize,

    /// Resume from the latest checkpoint instead of starting over
    #[config(default = false)]
    pub allow_restore_from_checkpoint: bool,

    /// How the pretrained table is used
    #[config(default = "EmbeddingMode::Trainable")]
    pub embedding_mode: EmbeddingMode,

    /// Upper bound on the padded sequence length
    pub max_seq_length: Option<usize>,

    /// Seed for shuffling and random embedding rows
    pub seed: Option<u64>,
}

impl Config {
    /// Reject configurations that cannot produce a run
    pub fn validate(&self) -> crate::error::Result<()> {
        let positive = [
            ("batch_size", self.batch_size),
            ("num_epochs", self.num_epochs),
            ("require_improvement", self.require_improvement),
            ("evaluate_every", self.evaluate_every),
            ("print_loss", self.print_loss),
            ("checkpoint_every", self.checkpoint_every),
            ("num_checkpoints_kept", self.num_checkpoints_kept),
            ("embedding_dim", self.embedding_dim),
            ("num_filters", self.num_filters),
            ("hidden_size", self.hidden_size),
        ];

        for (name, value) in positive {
            if value == 0 {
                return Err(Error::Configuration(format!("{name} must be > 0")));
            }
        }

        if self.filter_sizes.is_empty() || self.filter_sizes.contains(&0) {
            return Err(Error::Configuration(
                "filter_sizes must be a non-empty list of positive widths".to_string(),
            ));
        }

        if !(self.dropout_keep_prob > 0.0 && self.dropout_keep_prob <= 1.0) {
            return Err(Error::Configuration(
                "dropout_keep_prob must be in (0, 1]".to_string(),
            ));
        }

        if self.l2_reg_lambda < 0.0 {
            return Err(Error::Configuration(
                "l2_reg_lambda must be >= 0".to_string(),
            ));
        }

        if self.learning_rate <= 0.0 {
            return Err(Error::Configuration(
                "learning_rate must be > 0".to_string(),
            ));
        }

        if !(self.decay_rate > 0.0 && self.decay_rate <= 1.0) {
            return Err(Error::Configuration(
                "decay_rate must be in (0, 1]".to_string(),
            ));
        }

        if self.train_index == 0 {
            return Err(Error::Configuration(
                "train_index must leave at least one training file".to_string(),
            ));
        }

        if !self.data_path().is_dir() {
            return Err(Error::Configuration(format!(
                "data_dir {} is not a directory",
                self.data_dir
            )));
        }

        if self.embedding_mode.uses_pretrained() && self.embedding_file.is_none() {
            return Err(Error::Configuration(format!(
                "embedding mode {} needs an embedding_file",
                self.embedding_mode
            )));
        }

        Ok(())
    }

    /// The data directory
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    /// The per-architecture directory holding checkpoints and run artifacts
    pub fn run_dir(&self) -> PathBuf {
        PathBuf::from(&self.checkpoint_dir).join(self.architecture.to_string())
    }

    /// The per-architecture directory for class, prediction and label files
    pub fn results_dir(&self) -> PathBuf {
        self.data_path()
            .join("results")
            .join(self.architecture.to_string())
    }

    /// Dropout probability derived from the keep probability
    pub fn dropout(&self) -> f64 {
        1.0 - self.dropout_keep_prob
    }
}

/// Parse a comma separated list of filter widths, e.g. "3,4,5"
pub fn parse_filter_sizes(value: &str) -> crate::error::Result<Vec<usize>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|e| Error::Configuration(format!("invalid filter size {s:?}: {e}")))
        })
        .collect()
}
