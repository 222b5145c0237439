use burn::{
    config::Config,
    module::Module,
    nn::{Embedding, EmbeddingConfig},
    tensor::{backend::Backend, Int, Tensor},
};

use crate::training::EmbeddingMode;

/// Configuration for the word embedding layer
#[derive(Config, Debug)]
pub struct WordEmbeddingConfig {
    /// Number of rows in the table, including the pad and unknown tokens
    pub vocab_size: usize,

    /// Width of each word vector
    pub embedding_dim: usize,

    /// How the pretrained table is used
    #[config(default = "EmbeddingMode::Trainable")]
    pub mode: EmbeddingMode,
}

impl WordEmbeddingConfig {
    /// Number of concatenated channels produced per token
    pub fn channels(&self) -> usize {
        match self.mode {
            EmbeddingMode::DualChannel => 2,
            _ => 1,
        }
    }

    /// Feature width of the layer output
    pub fn d_output(&self) -> usize {
        self.embedding_dim * self.channels()
    }

    /// Initialize a randomly weighted layer
    pub fn init<B: Backend>(&self, device: &B::Device) -> WordEmbedding<B> {
        let table = EmbeddingConfig::new(self.vocab_size, self.embedding_dim);

        let secondary = match self.mode {
            EmbeddingMode::DualChannel => Some(table.init(device)),
            _ => None,
        };

        WordEmbedding {
            primary: table.init(device),
            secondary,
            frozen: matches!(
                self.mode,
                EmbeddingMode::Static | EmbeddingMode::DualChannel
            ),
        }
    }
}

/// Word embedding lookup.
///
/// The primary channel is frozen for static and dual-channel modes: gradients are cut at its
/// output, so the optimizer never sees them. In dual-channel mode a second, trainable copy of
/// the table is concatenated along the feature axis.
#[derive(Module, Debug)]
pub struct WordEmbedding<B: Backend> {
    primary: Embedding<B>,
    secondary: Option<Embedding<B>>,
    frozen: bool,
}

impl<B: Backend> WordEmbedding<B> {
    /// Look up token ids: [batch_size, seq_length] -> [batch_size, seq_length, d_output]
    pub fn forward(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let primary = self.primary.forward(tokens.clone());
        let primary = if self.frozen {
            primary.detach()
        } else {
            primary
        };

        match &self.secondary {
            Some(secondary) => Tensor::cat(vec![primary, secondary.forward(tokens)], 2),
            None => primary,
        }
    }

    /// Replace every channel's weights with the given [vocab_size, embedding_dim] table
    pub fn assign(mut self, table: Tensor<B, 2>) -> Self {
        self.primary.weight = self.primary.weight.map(|_| leaf(&table));

        self.secondary = self.secondary.map(|mut secondary| {
            secondary.weight = secondary.weight.map(|_| leaf(&table));
            secondary
        });

        self
    }
}

/// A tracked copy of `table` with its own graph node, so each channel receives its own gradient
fn leaf<B: Backend>(table: &Tensor<B, 2>) -> Tensor<B, 2> {
    table.clone().detach().require_grad()
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::{Autodiff, NdArray},
        optim::{AdamConfig, GradientsParams, Optimizer},
        tensor::{Data, Shape},
    };
    use pretty_assertions::assert_eq;

    use super::*;

    type TestBackend = NdArray<f32>;
    type TrainBackend = Autodiff<TestBackend>;

    const TABLE: [f32; 6] = [0.0, 0.0, 1.0, 2.0, 3.0, 4.0];

    fn table<B: Backend>(device: &B::Device) -> Tensor<B, 2> {
        Tensor::from_data(
            Data::<f32, 2>::new(TABLE.to_vec(), Shape::new([3, 2])).convert::<B::FloatElem>(),
            device,
        )
    }

    fn tokens<B: Backend>(device: &B::Device) -> Tensor<B, 2, Int> {
        Tensor::from_data(
            Data::<i64, 2>::new(vec![2, 1, 0], Shape::new([1, 3])).convert::<B::IntElem>(),
            device,
        )
    }

    fn weights(embedding: &Embedding<TrainBackend>) -> Vec<f32> {
        embedding.weight.val().into_data().value
    }

    /// Take one Adam step on the pretrained table with a loss that touches every row
    fn optimize(mode: EmbeddingMode) -> WordEmbedding<TrainBackend> {
        let device = Default::default();
        let config = WordEmbeddingConfig::new(3, 2).with_mode(mode);
        let embedding = config
            .init::<TrainBackend>(&device)
            .assign(table::<TrainBackend>(&device));

        let scale =
            Tensor::<TrainBackend, 3>::ones([1, 3, config.d_output()], &device).require_grad();
        let loss = (embedding.forward(tokens::<TrainBackend>(&device)) * scale).sum();
        let grads = GradientsParams::from_grads(loss.backward(), &embedding);

        let mut optim = AdamConfig::new().init::<TrainBackend, WordEmbedding<TrainBackend>>();
        optim.step(0.1, embedding, grads)
    }

    fn all_moved(after: &[f32]) -> bool {
        after.iter().zip(TABLE).all(|(after, before)| *after < before)
    }

    #[test]
    fn test_assigned_table_is_looked_up() {
        let device = Default::default();
        let embedding = WordEmbeddingConfig::new(3, 2)
            .init::<TestBackend>(&device)
            .assign(table(&device));

        let output = embedding.forward(tokens(&device));

        assert_eq!(output.dims(), [1, 3, 2]);
        assert_eq!(
            output.into_data().value,
            vec![3.0, 4.0, 1.0, 2.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_dual_channel_concatenates_features() {
        let device = Default::default();
        let config = WordEmbeddingConfig::new(3, 2).with_mode(EmbeddingMode::DualChannel);
        let embedding = config.init::<TestBackend>(&device).assign(table(&device));

        let output = embedding.forward(tokens(&device));

        assert_eq!(config.d_output(), 4);
        assert_eq!(output.dims(), [1, 3, 4]);
        assert_eq!(
            output.into_data().value,
            vec![3.0, 4.0, 3.0, 4.0, 1.0, 2.0, 1.0, 2.0, 0.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_static_table_survives_an_optimizer_step() {
        let embedding = optimize(EmbeddingMode::Static);

        assert_eq!(weights(&embedding.primary), TABLE.to_vec());
    }

    #[test]
    fn test_trainable_table_moves_with_an_optimizer_step() {
        let embedding = optimize(EmbeddingMode::Trainable);

        assert!(all_moved(&weights(&embedding.primary)));
    }

    #[test]
    fn test_dual_channel_trains_only_the_second_channel() {
        let embedding = optimize(EmbeddingMode::DualChannel);
        let secondary = embedding.secondary.as_ref().unwrap();

        assert_eq!(weights(&embedding.primary), TABLE.to_vec());
        assert!(all_moved(&weights(secondary)));
    }
}
