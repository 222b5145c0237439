use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv1d, Conv1dConfig},
        lstm::{Lstm, LstmConfig},
        Dropout, DropoutConfig, Linear, LinearConfig,
    },
    tensor::{activation::relu, backend::Backend, Data, ElementConversion, Int, Shape, Tensor},
};

use super::{
    classifier::{last_step, Classifier},
    WordEmbedding, WordEmbeddingConfig,
};

/// Configuration for the recurrent architectures
#[derive(Config, Debug)]
pub struct RnnConfig {
    /// The word embedding layer
    pub embedding: WordEmbeddingConfig,

    /// Total number of classes
    pub n_classes: usize,

    /// Size of the hidden state
    #[config(default = 300)]
    pub hidden_size: usize,

    /// Dropout probability before the output layer
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl RnnConfig {
    /// A single left-to-right LSTM
    pub fn init_lstm<B: Backend>(&self, device: &B::Device) -> TextLstm<B> {
        self.init_with_directions(device, false)
    }

    /// A left-to-right and a right-to-left LSTM with concatenated final states
    pub fn init_bilstm<B: Backend>(&self, device: &B::Device) -> TextLstm<B> {
        self.init_with_directions(device, true)
    }

    fn init_with_directions<B: Backend>(
        &self,
        device: &B::Device,
        bidirectional: bool,
    ) -> TextLstm<B> {
        let d_input = self.embedding.d_output();
        let lstm = LstmConfig::new(d_input, self.hidden_size, true);
        let directions = if bidirectional { 2 } else { 1 };

        TextLstm {
            embedding: self.embedding.init(device),
            lstm: lstm.init(device),
            reverse_lstm: bidirectional.then(|| lstm.init(device)),
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(self.hidden_size * directions, self.n_classes).init(device),
        }
    }
}

/// LSTM classifier over the embedded sequence, optionally bidirectional
#[derive(Module, Debug)]
pub struct TextLstm<B: Backend> {
    embedding: WordEmbedding<B>,
    lstm: Lstm<B>,
    reverse_lstm: Option<Lstm<B>>,
    dropout: Dropout,
    output: Linear<B>,
}

impl<B: Backend> Classifier<B> for TextLstm<B> {
    fn logits(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let embedded = self.embedding.forward(tokens);

        let (_, hidden_states) = self.lstm.forward(embedded.clone(), None);
        let mut features = last_step(hidden_states);

        if let Some(reverse_lstm) = &self.reverse_lstm {
            let (_, hidden_states) = reverse_lstm.forward(reverse_time(embedded), None);
            features = Tensor::cat(vec![features, last_step(hidden_states)], 1);
        }

        self.output.forward(self.dropout.forward(features))
    }

    fn assign_embedding(mut self, table: Tensor<B, 2>) -> Self {
        self.embedding = self.embedding.assign(table);
        self
    }
}

/// Configuration for the convolutional-recurrent architecture
#[derive(Config, Debug)]
pub struct CnnLstmConfig {
    /// The word embedding layer
    pub embedding: WordEmbeddingConfig,

    /// Total number of classes
    pub n_classes: usize,

    /// Convolution width
    #[config(default = 3)]
    pub filter_size: usize,

    /// Convolution output channels, which become the LSTM input features
    #[config(default = 100)]
    pub num_filters: usize,

    /// Size of the hidden state
    #[config(default = 300)]
    pub hidden_size: usize,

    /// Dropout probability before the output layer
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl CnnLstmConfig {
    /// Initialize the model
    pub fn init<B: Backend>(&self, device: &B::Device) -> TextCnnLstm<B> {
        TextCnnLstm {
            embedding: self.embedding.init(device),
            convolution: Conv1dConfig::new(
                self.embedding.d_output(),
                self.num_filters,
                self.filter_size,
            )
            .init(device),
            lstm: LstmConfig::new(self.num_filters, self.hidden_size, true).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(self.hidden_size, self.n_classes).init(device),
        }
    }
}

/// Convolution features read by an LSTM
#[derive(Module, Debug)]
pub struct TextCnnLstm<B: Backend> {
    embedding: WordEmbedding<B>,
    convolution: Conv1d<B>,
    lstm: Lstm<B>,
    dropout: Dropout,
    output: Linear<B>,
}

impl<B: Backend> Classifier<B> for TextCnnLstm<B> {
    fn logits(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let embedded = self.embedding.forward(tokens).swap_dims(1, 2);

        // [batch_size, seq_length - filter_size + 1, num_filters]
        let features = relu(self.convolution.forward(embedded)).swap_dims(1, 2);

        let (_, hidden_states) = self.lstm.forward(features, None);

        self.output.forward(self.dropout.forward(last_step(hidden_states)))
    }

    fn assign_embedding(mut self, table: Tensor<B, 2>) -> Self {
        self.embedding = self.embedding.assign(table);
        self
    }
}

/// Reverse the time axis of [batch_size, seq_length, d_input]
fn reverse_time<B: Backend>(input: Tensor<B, 3>) -> Tensor<B, 3> {
    let [_, seq_length, _] = input.dims();

    let indices = Tensor::<B, 1, Int>::from_data(
        Data::<B::IntElem, 1>::new(
            (0..seq_length).rev().map(|i| (i as i64).elem::<B::IntElem>()).collect(),
            Shape::new([seq_length]),
        ),
        &input.device(),
    );

    input.select(1, indices)
}
