use std::path::PathBuf;

use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};

use super::{
    artifacts::{self, Encoding},
    batcher::BatchGenerator,
};
use crate::{
    datasets::{self, Corpus},
    error::Result,
    models::{Classifier, ModelConfig},
    training::{
        session::optimizer, trainer::iterations_per_epoch, CheckpointManager, Config,
        EmbeddingMode, EvaluationPass, EvaluationReport, Outcome, Session, SummaryWriter,
        TrainingLoop,
    },
};

/// What a finished training run produced
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    /// How the training loop ended
    pub outcome: Outcome,

    /// The held-out evaluation
    pub report: EvaluationReport,

    /// The file of predicted labels
    pub predictions_file: PathBuf,

    /// The file of true labels
    pub labels_file: PathBuf,
}

/// Load the data, train the configured architecture, and evaluate it on the held-out file
pub async fn train<B: AutodiffBackend>(
    device: B::Device,
    config: Config,
) -> Result<TrainingSummary> {
    config.validate()?;

    log::info!("Parameters:\n{}", serde_json::to_string_pretty(&config)?);

    let corpus = datasets::load(&config).await?;

    let results_dir = config.results_dir();
    std::fs::create_dir_all(&results_dir)?;
    corpus
        .labels
        .write_class_file(results_dir.join(format!("class_{}.csv", config.train_index)))?;

    let run_dir = config.run_dir();
    let manager = if config.allow_restore_from_checkpoint {
        CheckpointManager::open(&run_dir, config.num_checkpoints_kept)?
    } else {
        CheckpointManager::create(&run_dir, config.num_checkpoints_kept)?
    };

    let model_config =
        ModelConfig::from_training(&config, corpus.vocabulary.len(), corpus.labels.len());

    let encoding = Encoding {
        vocabulary: corpus.vocabulary.clone(),
        labels: corpus.labels.clone(),
        seq_length: corpus.seq_length,
    };
    artifacts::save(&run_dir, &config, &model_config, &encoding)?;

    log::info!(
        "Training {} on {} examples, evaluating on {}",
        model_config.architecture(),
        corpus.train.len(),
        corpus.dev.len()
    );

    let (outcome, report) = match &model_config {
        ModelConfig::TextCnn(c) => {
            run::<B, _>(c.init_text_cnn::<B>(&device), &config, &corpus, manager, &device)?
        }
        ModelConfig::MultiLayerCnn(c) => {
            run::<B, _>(c.init_multi_layer::<B>(&device), &config, &corpus, manager, &device)?
        }
        ModelConfig::HierarchicalCnn(c) => {
            run::<B, _>(c.init_hierarchical::<B>(&device), &config, &corpus, manager, &device)?
        }
        ModelConfig::TextLstm(c) => {
            run::<B, _>(c.init_lstm::<B>(&device), &config, &corpus, manager, &device)?
        }
        ModelConfig::TextBiLstm(c) => {
            run::<B, _>(c.init_bilstm::<B>(&device), &config, &corpus, manager, &device)?
        }
        ModelConfig::TextCnnLstm(c) => {
            run::<B, _>(c.init::<B>(&device), &config, &corpus, manager, &device)?
        }
    };

    let (predictions_file, labels_file) = report.write(&results_dir, config.train_index)?;

    log::info!(
        "Wrote predictions to {} and labels to {}",
        predictions_file.display(),
        labels_file.display()
    );

    Ok(TrainingSummary {
        outcome,
        report,
        predictions_file,
        labels_file,
    })
}

/// Restore or initialize the model, train it, and evaluate it
fn run<B, M>(
    model: M,
    config: &Config,
    corpus: &Corpus,
    mut manager: CheckpointManager,
    device: &B::Device,
) -> Result<(Outcome, EvaluationReport)>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Classifier<B>,
    M::InnerModule: Classifier<B::InnerBackend>,
{
    let table = corpus
        .embedding
        .as_ref()
        .map(|table| table.to_tensor::<B>(device));

    let (model, start_step) = if config.allow_restore_from_checkpoint {
        let (model, step) = manager.restore::<B, M>(model, device)?;

        match (table, config.embedding_mode) {
            (Some(table), EmbeddingMode::Static) => (model.assign_embedding(table), step),
            _ => (model, step),
        }
    } else {
        match table {
            Some(table) => (model.assign_embedding(table), 0),
            None => (model, 0),
        }
    };

    let iterations = iterations_per_epoch(corpus.train.len(), config.batch_size);

    let mut session = Session::new(
        model,
        optimizer(config).init(),
        config,
        corpus.seq_length,
        iterations,
        start_step,
        device,
    );

    let (train_summary, test_summary) = SummaryWriter::for_run(config.run_dir())?;

    let mut training = TrainingLoop::new(config, corpus.train.len()).with_summary(train_summary);
    if config.allow_restore_from_checkpoint {
        training = training.resume(start_step);
    }

    let batches = BatchGenerator::new(
        &corpus.train,
        &corpus.labels,
        config.batch_size,
        config.num_epochs,
        true,
        config.seed,
    );

    let outcome = training.run(&mut session, batches, &mut manager)?;

    log::info!(
        "Training finished at step {} ({}), best accuracy {:.4}",
        outcome.state.current_step,
        outcome.reason,
        outcome.state.best_accuracy
    );

    let report = EvaluationPass::new(config.evaluate_every)
        .with_summary(test_summary)
        .run(
            &session,
            BatchGenerator::single_pass(&corpus.dev, &corpus.labels, config.batch_size),
            &corpus.labels,
        )?;

    Ok((outcome, report))
}
