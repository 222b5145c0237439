use std::path::Path;

use burn::{
    data::dataloader::batcher::Batcher as _,
    tensor::{backend::Backend, ElementConversion},
};

use super::{
    artifacts::{self, Encoding},
    batcher::{Batcher, Infer},
};
use crate::{
    error::{Error, Result},
    models::{Classifier, ModelConfig},
    training::CheckpointManager,
    utils::tensors::to_indices,
};

/// The predicted class of one text
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// The input text
    pub text: String,

    /// The predicted label
    pub label: String,

    /// Softmax probability of the predicted label
    pub confidence: f32,
}

/// Classify texts with the latest checkpoint of a finished run
pub fn infer<B: Backend>(
    device: B::Device,
    run_dir: impl AsRef<Path>,
    texts: Vec<String>,
) -> Result<Vec<Prediction>> {
    let run_dir = run_dir.as_ref();
    let (config, model_config, encoding) = artifacts::load(run_dir)?;
    let manager = CheckpointManager::open(run_dir, config.num_checkpoints_kept)?;

    match &model_config {
        ModelConfig::TextCnn(c) => predict::<B, _>(
            c.init_text_cnn::<B>(&device),
            &manager,
            &encoding,
            texts,
            &device,
        ),
        ModelConfig::MultiLayerCnn(c) => predict::<B, _>(
            c.init_multi_layer::<B>(&device),
            &manager,
            &encoding,
            texts,
            &device,
        ),
        ModelConfig::HierarchicalCnn(c) => predict::<B, _>(
            c.init_hierarchical::<B>(&device),
            &manager,
            &encoding,
            texts,
            &device,
        ),
        ModelConfig::TextLstm(c) => predict::<B, _>(
            c.init_lstm::<B>(&device),
            &manager,
            &encoding,
            texts,
            &device,
        ),
        ModelConfig::TextBiLstm(c) => predict::<B, _>(
            c.init_bilstm::<B>(&device),
            &manager,
            &encoding,
            texts,
            &device,
        ),
        ModelConfig::TextCnnLstm(c) => predict::<B, _>(
            c.init::<B>(&device),
            &manager,
            &encoding,
            texts,
            &device,
        ),
    }
}

fn predict<B: Backend, M: Classifier<B>>(
    model: M,
    manager: &CheckpointManager,
    encoding: &Encoding,
    texts: Vec<String>,
    device: &B::Device,
) -> Result<Vec<Prediction>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let (model, step) = manager.restore::<B, M>(model, device)?;
    log::debug!("Classifying {} texts with the step {step} checkpoint", texts.len());

    let batcher = Batcher::<B>::new(device.clone(), encoding.seq_length);
    let item: Infer<B> = batcher.batch(texts.iter().map(|text| encoding.encode(text)).collect());

    let probabilities = model.infer(item);
    let classes = to_indices(probabilities.clone().argmax(1));
    let confidences = probabilities.max_dim(1).into_data().value;

    texts
        .into_iter()
        .zip(classes)
        .zip(confidences)
        .map(|((text, class), confidence)| {
            let label = encoding
                .labels
                .decode(class)
                .ok_or(Error::UnknownClass(class))?;

            Ok(Prediction {
                text,
                label: label.to_string(),
                confidence: confidence.elem::<f32>(),
            })
        })
        .collect()
}
