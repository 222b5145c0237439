use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::training::Config;

/// The common classifier interface shared by every architecture
pub mod classifier;

/// Word embedding layer with pretrained table support
pub mod embedding;

/// Convolutional architectures
pub mod cnn;

/// Recurrent and convolutional-recurrent architectures
pub mod lstm;

pub use classifier::Classifier;
pub use cnn::{CnnConfig, StackedCnn, TextCnn};
pub use embedding::{WordEmbedding, WordEmbeddingConfig};
pub use lstm::{CnnLstmConfig, RnnConfig, TextCnnLstm, TextLstm};

/// The unique string token that identifies the TextCNN architecture
pub static TEXT_CNN: &str = "textcnn";

/// The unique string token that identifies the multi-layer CNN architecture
pub static MULTI_LAYER_CNN: &str = "multi_layers_cnn";

/// The unique string token that identifies the hierarchical CNN architecture
pub static HIERARCHICAL_CNN: &str = "hierarchical_cnn";

/// The unique string token that identifies the LSTM architecture
pub static TEXT_LSTM: &str = "textlstm";

/// The unique string token that identifies the bidirectional LSTM architecture
pub static TEXT_BILSTM: &str = "text_bilstm";

/// The unique string token that identifies the CNN-LSTM architecture
pub static TEXT_CNN_LSTM: &str = "text_cnn_lstm";

/// Available Architectures
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    /// Single convolution layer per filter size
    #[serde(rename = "textcnn")]
    TextCnn,

    /// Two stacked convolutions per filter size
    #[serde(rename = "multi_layers_cnn")]
    MultiLayerCnn,

    /// Phrase convolutions pooled into regions, then region convolutions
    #[serde(rename = "hierarchical_cnn")]
    HierarchicalCnn,

    /// Unidirectional LSTM
    #[serde(rename = "textlstm")]
    TextLstm,

    /// Bidirectional LSTM
    #[serde(rename = "text_bilstm")]
    TextBiLstm,

    /// Convolution feeding an LSTM
    #[serde(rename = "text_cnn_lstm")]
    TextCnnLstm,
}

impl Architecture {
    /// Every architecture, in display order
    pub const ALL: [Architecture; 6] = [
        Architecture::TextCnn,
        Architecture::MultiLayerCnn,
        Architecture::HierarchicalCnn,
        Architecture::TextLstm,
        Architecture::TextBiLstm,
        Architecture::TextCnnLstm,
    ];

    /// Get the unique string token that identifies this architecture
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::TextCnn => TEXT_CNN,
            Architecture::MultiLayerCnn => MULTI_LAYER_CNN,
            Architecture::HierarchicalCnn => HIERARCHICAL_CNN,
            Architecture::TextLstm => TEXT_LSTM,
            Architecture::TextBiLstm => TEXT_BILSTM,
            Architecture::TextCnnLstm => TEXT_CNN_LSTM,
        }
    }

    /// The shortest padded sequence the architecture's convolutions can consume
    pub fn min_seq_length(&self, filter_sizes: &[usize]) -> usize {
        let widest = filter_sizes.iter().copied().max().unwrap_or(1);

        match self {
            Architecture::TextCnn | Architecture::TextCnnLstm => widest,
            Architecture::MultiLayerCnn => 2 * widest - 1,
            Architecture::HierarchicalCnn => 3 * widest,
            Architecture::TextLstm | Architecture::TextBiLstm => 1,
        }
    }
}

impl TryFrom<&str> for Architecture {
    type Error = ArchitectureError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Architecture::ALL
            .into_iter()
            .find(|architecture| architecture.as_str() == value.to_lowercase())
            .ok_or_else(|| ArchitectureError::Unknown(value.to_string()))
    }
}

impl Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Architecture Error
#[derive(thiserror::Error, Debug)]
pub enum ArchitectureError {
    /// No architecture found for the given string
    #[error("no architecture found for {0}")]
    Unknown(String),
}

/// The architecture kind together with its parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelConfig {
    /// TextCNN
    TextCnn(CnnConfig),

    /// Multi-layer CNN
    MultiLayerCnn(CnnConfig),

    /// Hierarchical CNN
    HierarchicalCnn(CnnConfig),

    /// LSTM
    TextLstm(RnnConfig),

    /// Bidirectional LSTM
    TextBiLstm(RnnConfig),

    /// CNN-LSTM
    TextCnnLstm(CnnLstmConfig),
}

impl ModelConfig {
    /// Derive the model configuration from the experiment configuration
    pub fn from_training(config: &Config, vocab_size: usize, n_classes: usize) -> Self {
        let embedding = WordEmbeddingConfig::new(vocab_size, config.embedding_dim)
            .with_mode(config.embedding_mode);

        let cnn = || {
            CnnConfig::new(embedding.clone(), n_classes)
                .with_filter_sizes(config.filter_sizes.clone())
                .with_num_filters(config.num_filters)
                .with_dropout(config.dropout())
        };

        let rnn = || {
            RnnConfig::new(embedding.clone(), n_classes)
                .with_hidden_size(config.hidden_size)
                .with_dropout(config.dropout())
        };

        match config.architecture {
            Architecture::TextCnn => ModelConfig::TextCnn(cnn()),
            Architecture::MultiLayerCnn => ModelConfig::MultiLayerCnn(cnn()),
            Architecture::HierarchicalCnn => ModelConfig::HierarchicalCnn(cnn()),
            Architecture::TextLstm => ModelConfig::TextLstm(rnn()),
            Architecture::TextBiLstm => ModelConfig::TextBiLstm(rnn()),
            Architecture::TextCnnLstm => ModelConfig::TextCnnLstm(
                CnnLstmConfig::new(embedding.clone(), n_classes)
                    .with_filter_size(config.filter_sizes.first().copied().unwrap_or(3))
                    .with_num_filters(config.num_filters)
                    .with_hidden_size(config.hidden_size)
                    .with_dropout(config.dropout()),
            ),
        }
    }

    /// The architecture kind
    pub fn architecture(&self) -> Architecture {
        match self {
            ModelConfig::TextCnn(_) => Architecture::TextCnn,
            ModelConfig::MultiLayerCnn(_) => Architecture::MultiLayerCnn,
            ModelConfig::HierarchicalCnn(_) => Architecture::HierarchicalCnn,
            ModelConfig::TextLstm(_) => Architecture::TextLstm,
            ModelConfig::TextBiLstm(_) => Architecture::TextBiLstm,
            ModelConfig::TextCnnLstm(_) => Architecture::TextCnnLstm,
        }
    }

    /// The embedding configuration shared by every variant
    pub fn embedding(&self) -> &WordEmbeddingConfig {
        match self {
            ModelConfig::TextCnn(c)
            | ModelConfig::MultiLayerCnn(c)
            | ModelConfig::HierarchicalCnn(c) => &c.embedding,
            ModelConfig::TextLstm(c) | ModelConfig::TextBiLstm(c) => &c.embedding,
            ModelConfig::TextCnnLstm(c) => &c.embedding,
        }
    }
}
