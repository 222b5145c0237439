use burn::{
    data::dataloader::batcher::Batcher as _,
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, ElementConversion, Int, Tensor},
    LearningRate,
};

use super::{Config, EvalModel, Evaluation, StepMetrics, StepModel};
use crate::{
    models::Classifier,
    pipelines::text_classification::batcher::{Batch, Batcher, Train},
    utils::tensors::to_indices,
};

/// The Adam optimizer configured for the experiment, with L2 regularization as weight decay
pub fn optimizer(config: &Config) -> AdamConfig {
    let adam = AdamConfig::new();

    if config.l2_reg_lambda > 0.0 {
        adam.with_weight_decay(Some(WeightDecayConfig::new(config.l2_reg_lambda)))
    } else {
        adam
    }
}

/// Staircase exponential decay: the rate drops by `decay_rate` once per epoch
pub fn learning_rate(config: &Config, step: usize, iterations_per_epoch: usize) -> LearningRate {
    let epochs = step / iterations_per_epoch.max(1);

    config.learning_rate * config.decay_rate.powi(epochs as i32)
}

/// Owns a model, its optimizer and the global step
pub struct Session<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Classifier<B>,
    O: Optimizer<M, B>,
{
    model: M,
    optimizer: O,
    batcher: Batcher<B>,
    valid_batcher: Batcher<B::InnerBackend>,
    config: Config,
    iterations_per_epoch: usize,
    global_step: usize,
}

impl<B, M, O> Session<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Classifier<B>,
    M::InnerModule: Classifier<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    /// Create a session starting at `global_step`
    pub fn new(
        model: M,
        optimizer: O,
        config: &Config,
        seq_length: usize,
        iterations_per_epoch: usize,
        global_step: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            model,
            optimizer,
            batcher: Batcher::new(device.clone(), seq_length),
            valid_batcher: Batcher::new(device.clone(), seq_length),
            config: config.clone(),
            iterations_per_epoch,
            global_step,
        }
    }

    /// The model being trained
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Give up the trained model
    pub fn into_model(self) -> M {
        self.model
    }
}

impl<B, M, O> StepModel for Session<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Classifier<B>,
    M::InnerModule: Classifier<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    fn train_step(&mut self, batch: &Batch) -> StepMetrics {
        let item: Train<B> = self.batcher.batch(batch.items.clone());
        let output = self.model.forward(item);

        let loss = output.loss.clone().into_scalar().elem::<f64>();
        let accuracy = accuracy(output.output.argmax(1), output.targets, batch.len());

        let lr = learning_rate(&self.config, self.global_step, self.iterations_per_epoch);
        let grads = GradientsParams::from_grads(output.loss.backward(), &self.model);
        self.model = self.optimizer.step(lr, self.model.clone(), grads);

        self.global_step += 1;

        StepMetrics::new(self.global_step, loss, accuracy, lr)
    }

    fn global_step(&self) -> usize {
        self.global_step
    }
}

impl<B, M, O> EvalModel for Session<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Classifier<B>,
    M::InnerModule: Classifier<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    fn evaluate(&self, batch: &Batch) -> Evaluation {
        let model = self.model.valid();
        let item: Train<B::InnerBackend> = self.valid_batcher.batch(batch.items.clone());

        let logits = model.logits(item.tokens);
        let loss = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), item.targets.clone())
            .into_scalar()
            .elem::<f64>();

        let predictions = logits.argmax(1);
        let correct = predictions
            .clone()
            .flatten::<1>(0, 1)
            .equal(item.targets)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>() as usize;

        Evaluation::new(to_indices(predictions), loss, correct)
    }
}

/// Fraction of rows whose predicted class matches the target
fn accuracy<B: burn::tensor::backend::Backend>(
    predictions: Tensor<B, 2, Int>,
    targets: Tensor<B, 1, Int>,
    batch_size: usize,
) -> f64 {
    if batch_size == 0 {
        return 0.0;
    }

    let correct = predictions
        .flatten::<1>(0, 1)
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>();

    correct as f64 / batch_size as f64
}

#[cfg(test)]
mod tests {
    use burn::backend::{Autodiff, NdArray};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        datasets::LabelEncoder,
        models::{CnnConfig, WordEmbeddingConfig},
        pipelines::text_classification::{batcher::BatchGenerator, item::Example},
        training::EmbeddingMode,
    };

    type TestBackend = Autodiff<NdArray<f32>>;

    fn examples() -> Vec<Example> {
        vec![
            Example::new(vec![2, 3, 4, 0], 0),
            Example::new(vec![5, 6, 7, 8], 1),
            Example::new(vec![2, 4, 0, 0], 0),
        ]
    }

    #[test]
    fn test_learning_rate_decays_once_per_epoch() {
        let config = Config::new()
            .with_learning_rate(1.0)
            .with_decay_rate(0.5);

        assert_eq!(learning_rate(&config, 0, 3), 1.0);
        assert_eq!(learning_rate(&config, 2, 3), 1.0);
        assert_eq!(learning_rate(&config, 3, 3), 0.5);
        assert_eq!(learning_rate(&config, 7, 3), 0.25);
    }

    #[test]
    fn test_steps_advance_global_step_and_evaluate() {
        let device = Default::default();
        let config = Config::new().with_learning_rate(1e-2);
        let model = CnnConfig::new(
            WordEmbeddingConfig::new(10, 4).with_mode(EmbeddingMode::Random),
            2,
        )
        .with_num_filters(3)
        .init_text_cnn::<TestBackend>(&device);

        let mut session = Session::new(
            model,
            optimizer(&config).init(),
            &config,
            4,
            1,
            0,
            &device,
        );

        let examples = examples();
        let labels = LabelEncoder::fit(["a", "b"]);

        for batch in BatchGenerator::new(&examples, &labels, 2, 2, false, None) {
            let metrics = session.train_step(&batch);

            assert!(metrics.loss.is_finite());
            assert!((0.0..=1.0).contains(&metrics.accuracy));
            assert_eq!(
                metrics.learning_rate,
                learning_rate(&config, metrics.step - 1, 1)
            );
        }

        assert_eq!(session.global_step(), 4);

        let batch = BatchGenerator::single_pass(&examples, &labels, 3)
            .next()
            .unwrap();
        let evaluation = session.evaluate(&batch);

        assert_eq!(evaluation.predictions.len(), 3);
        assert!(evaluation.correct <= 3);
        assert!(evaluation.predictions.iter().all(|&class| class < 2));
    }
}
