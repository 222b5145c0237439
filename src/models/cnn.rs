use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv1d, Conv1dConfig},
        pool::{MaxPool1d, MaxPool1dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig,
    },
    tensor::{activation::relu, backend::Backend, Int, Tensor},
};

use super::{
    classifier::{max_over_time, Classifier},
    WordEmbedding, WordEmbeddingConfig,
};

/// Configuration shared by the convolutional architectures
#[derive(Config, Debug)]
pub struct CnnConfig {
    /// The word embedding layer
    pub embedding: WordEmbeddingConfig,

    /// Total number of classes
    pub n_classes: usize,

    /// Convolution widths, one branch per width
    #[config(default = "vec![3]")]
    pub filter_sizes: Vec<usize>,

    /// Output channels per branch
    #[config(default = 100)]
    pub num_filters: usize,

    /// Dropout probability before the output layer
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl CnnConfig {
    /// One convolution per filter size, max-pooled over time
    pub fn init_text_cnn<B: Backend>(&self, device: &B::Device) -> TextCnn<B> {
        let d_input = self.embedding.d_output();

        TextCnn {
            embedding: self.embedding.init(device),
            convolutions: self
                .filter_sizes
                .iter()
                .map(|&width| Conv1dConfig::new(d_input, self.num_filters, width).init(device))
                .collect(),
            dropout: DropoutConfig::new(self.dropout).init(),
            output: self.init_output(device),
        }
    }

    /// Two stacked convolutions per filter size
    pub fn init_multi_layer<B: Backend>(&self, device: &B::Device) -> StackedCnn<B> {
        self.init_stacked(device, None)
    }

    /// Phrase convolutions pooled into regions of two, followed by region convolutions
    pub fn init_hierarchical<B: Backend>(&self, device: &B::Device) -> StackedCnn<B> {
        self.init_stacked(device, Some(MaxPool1dConfig::new(2).with_stride(2)))
    }

    fn init_stacked<B: Backend>(
        &self,
        device: &B::Device,
        pool: Option<MaxPool1dConfig>,
    ) -> StackedCnn<B> {
        let d_input = self.embedding.d_output();

        let blocks = self
            .filter_sizes
            .iter()
            .map(|&width| ConvBlock {
                local: Conv1dConfig::new(d_input, self.num_filters, width).init(device),
                pool: pool.as_ref().map(|pool| pool.init()),
                region: Conv1dConfig::new(self.num_filters, self.num_filters, width)
                    .init(device),
            })
            .collect();

        StackedCnn {
            embedding: self.embedding.init(device),
            blocks,
            dropout: DropoutConfig::new(self.dropout).init(),
            output: self.init_output(device),
        }
    }

    fn init_output<B: Backend>(&self, device: &B::Device) -> Linear<B> {
        LinearConfig::new(self.num_filters * self.filter_sizes.len(), self.n_classes)
            .init(device)
    }
}

/// TextCNN: parallel convolutions of different widths over the embedded sequence
#[derive(Module, Debug)]
pub struct TextCnn<B: Backend> {
    embedding: WordEmbedding<B>,
    convolutions: Vec<Conv1d<B>>,
    dropout: Dropout,
    output: Linear<B>,
}

impl<B: Backend> Classifier<B> for TextCnn<B> {
    fn logits(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        // [batch_size, d_embedding, seq_length]
        let embedded = self.embedding.forward(tokens).swap_dims(1, 2);

        let pooled = self
            .convolutions
            .iter()
            .map(|conv| max_over_time(relu(conv.forward(embedded.clone()))))
            .collect();

        let features = Tensor::cat(pooled, 1);

        self.output.forward(self.dropout.forward(features))
    }

    fn assign_embedding(mut self, table: Tensor<B, 2>) -> Self {
        self.embedding = self.embedding.assign(table);
        self
    }
}

/// A two level convolution branch
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    local: Conv1d<B>,
    pool: Option<MaxPool1d>,
    region: Conv1d<B>,
}

impl<B: Backend> ConvBlock<B> {
    /// [batch_size, d_input, seq_length] -> [batch_size, num_filters]
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let local = relu(self.local.forward(input));

        let local = match &self.pool {
            Some(pool) => pool.forward(local),
            None => local,
        };

        max_over_time(relu(self.region.forward(local)))
    }
}

/// Stacked convolutions per filter size, used by the multi-layer and hierarchical variants
#[derive(Module, Debug)]
pub struct StackedCnn<B: Backend> {
    embedding: WordEmbedding<B>,
    blocks: Vec<ConvBlock<B>>,
    dropout: Dropout,
    output: Linear<B>,
}

impl<B: Backend> Classifier<B> for StackedCnn<B> {
    fn logits(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let embedded = self.embedding.forward(tokens).swap_dims(1, 2);

        let pooled = self
            .blocks
            .iter()
            .map(|block| block.forward(embedded.clone()))
            .collect();

        let features = Tensor::cat(pooled, 1);

        self.output.forward(self.dropout.forward(features))
    }

    fn assign_embedding(mut self, table: Tensor<B, 2>) -> Self {
        self.embedding = self.embedding.assign(table);
        self
    }
}
