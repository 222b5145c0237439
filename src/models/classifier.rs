use burn::{
    module::Module,
    nn::loss::CrossEntropyLossConfig,
    tensor::{activation::softmax, backend::Backend, Int, Tensor},
    train::ClassificationOutput,
};

use crate::pipelines::text_classification::batcher::{Infer, Train};

/// A trait for models that can be used for text classification
pub trait Classifier<B: Backend>: Module<B> {
    /// Unnormalized class scores: [batch_size, seq_length] -> [batch_size, n_classes]
    fn logits(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 2>;

    /// Replace the word embedding weights with a pretrained table
    fn assign_embedding(self, table: Tensor<B, 2>) -> Self;

    /// Defines forward pass for training
    fn forward(&self, item: Train<B>) -> ClassificationOutput<B> {
        let output = self.logits(item.tokens);
        let targets = item.targets;

        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput {
            loss,
            output,
            targets,
        }
    }

    /// Defines forward pass for inference
    fn infer(&self, item: Infer<B>) -> Tensor<B, 2> {
        softmax(self.logits(item.tokens), 1)
    }
}

/// Max-pool a feature map over time: [batch_size, channels, length] -> [batch_size, channels]
pub(crate) fn max_over_time<B: Backend>(features: Tensor<B, 3>) -> Tensor<B, 2> {
    let [batch_size, channels, _] = features.dims();

    features.max_dim(2).reshape([batch_size, channels])
}

/// The state at the final time step: [batch_size, seq_length, d_hidden] -> [batch_size, d_hidden]
pub(crate) fn last_step<B: Backend>(states: Tensor<B, 3>) -> Tensor<B, 2> {
    let [batch_size, seq_length, d_hidden] = states.dims();

    states
        .slice([0..batch_size, seq_length - 1..seq_length, 0..d_hidden])
        .reshape([batch_size, d_hidden])
}
