use std::path::{Path, PathBuf};

use super::{EvalModel, SummaryRecord, SummaryWriter};
use crate::{
    datasets::LabelEncoder,
    error::{Error, Result},
    pipelines::text_classification::batcher::Batch,
};

/// Predictions and true labels for the held-out set, in input order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvaluationReport {
    /// Predicted label per example
    pub predictions: Vec<String>,

    /// True label per example
    pub labels: Vec<String>,

    /// Mean batch loss
    pub loss: f64,

    /// Fraction of examples classified correctly
    pub accuracy: f64,

    /// Number of batches evaluated
    pub batches: usize,
}

impl EvaluationReport {
    /// Write `prediction_<index>.csv` and `label_<index>.csv` into `dir`
    pub fn write(&self, dir: impl AsRef<Path>, index: usize) -> Result<(PathBuf, PathBuf)> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| Error::write(dir, e))?;

        let predictions = dir.join(format!("prediction_{index}.csv"));
        let labels = dir.join(format!("label_{index}.csv"));

        write_column(&predictions, &self.predictions)?;
        write_column(&labels, &self.labels)?;

        Ok((predictions, labels))
    }
}

/// One pass over the held-out batches with dropout disabled
#[derive(Debug)]
pub struct EvaluationPass {
    evaluate_every: usize,
    summary: Option<SummaryWriter>,
}

impl EvaluationPass {
    /// Report streaming accuracy every `evaluate_every` batches
    pub fn new(evaluate_every: usize) -> Self {
        Self {
            evaluate_every: evaluate_every.max(1),
            summary: None,
        }
    }

    /// Append every batch's loss and streaming accuracy to `summary`
    pub fn with_summary(mut self, summary: SummaryWriter) -> Self {
        self.summary = Some(summary);
        self
    }

    /// Classify every batch and collect predicted and true labels
    pub fn run<M: EvalModel>(
        &mut self,
        model: &M,
        batches: impl IntoIterator<Item = Batch>,
        classes: &LabelEncoder,
    ) -> Result<EvaluationReport> {
        let mut report = EvaluationReport::default();
        let mut total_loss = 0.0;
        let mut correct = 0;

        for batch in batches {
            let evaluation = model.evaluate(&batch);

            for class in evaluation.predictions {
                let label = classes.decode(class).ok_or(Error::UnknownClass(class))?;
                report.predictions.push(label.to_string());
            }

            report.labels.extend(batch.labels);
            report.batches += 1;
            total_loss += evaluation.loss;
            correct += evaluation.correct;

            let seen = report.labels.len();
            let accuracy = correct as f64 / seen.max(1) as f64;

            if let Some(summary) = self.summary.as_mut() {
                summary.write(SummaryRecord::new(
                    report.batches,
                    evaluation.loss,
                    accuracy,
                    None,
                ))?;
            }

            if report.batches % self.evaluate_every == 0 {
                log::info!(
                    "Evaluation step {}, loss {:.4}, accuracy {:.4}",
                    report.batches,
                    evaluation.loss,
                    accuracy
                );
            }
        }

        if report.batches > 0 {
            report.loss = total_loss / report.batches as f64;
            report.accuracy = correct as f64 / report.labels.len().max(1) as f64;

            log::info!(
                "Evaluated {} examples, loss {:.4}, accuracy {:.4}",
                report.labels.len(),
                report.loss,
                report.accuracy
            );
        }

        Ok(report)
    }
}

fn write_column(path: &Path, values: &[String]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| Error::write(path, e))?;

    for value in values {
        writer
            .write_record([value])
            .map_err(|e| Error::write(path, e))?;
    }

    writer.flush().map_err(|e| Error::write(path, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        pipelines::text_classification::{batcher::BatchGenerator, item::Example},
        training::Evaluation,
    };

    /// Predicts the first token id as the class
    struct EchoModel;

    impl EvalModel for EchoModel {
        fn evaluate(&self, batch: &Batch) -> Evaluation {
            let predictions: Vec<usize> = batch.items.iter().map(|item| item.tokens[0]).collect();
            let correct = batch
                .items
                .iter()
                .zip(&predictions)
                .filter(|(item, prediction)| item.label == **prediction)
                .count();

            Evaluation::new(predictions, 0.5, correct)
        }
    }

    fn labels() -> LabelEncoder {
        LabelEncoder::fit(["bug", "feature", "question"])
    }

    #[test]
    fn test_report_keeps_input_order() {
        let examples = vec![
            Example::new(vec![0], 0),
            Example::new(vec![2], 1),
            Example::new(vec![1], 1),
            Example::new(vec![2], 2),
            Example::new(vec![0], 2),
        ];
        let labels = labels();

        let report = EvaluationPass::new(1)
            .run(
                &EchoModel,
                BatchGenerator::single_pass(&examples, &labels, 2),
                &labels,
            )
            .unwrap();

        assert_eq!(
            report.predictions,
            vec!["bug", "question", "feature", "question", "bug"]
        );
        assert_eq!(
            report.labels,
            vec!["bug", "feature", "feature", "question", "question"]
        );
        assert_eq!(report.batches, 3);
        assert!((report.accuracy - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_empty_held_out_set() {
        let labels = labels();

        let report = EvaluationPass::new(1)
            .run(&EchoModel, BatchGenerator::single_pass(&[], &labels, 2), &labels)
            .unwrap();

        assert_eq!(report, EvaluationReport::default());
    }

    #[test]
    fn test_unknown_class_is_an_error() {
        let examples = vec![Example::new(vec![7], 0)];
        let labels = labels();

        let result = EvaluationPass::new(1).run(
            &EchoModel,
            BatchGenerator::single_pass(&examples, &labels, 2),
            &labels,
        );

        assert!(matches!(result, Err(Error::UnknownClass(7))));
    }

    #[test]
    fn test_write_single_column_files() {
        let dir = tempfile::tempdir().unwrap();
        let report = EvaluationReport {
            predictions: vec!["bug".to_string(), "a, b".to_string()],
            labels: vec!["bug".to_string(), "feature".to_string()],
            ..Default::default()
        };

        let (predictions, labels) = report.write(dir.path(), 1).unwrap();

        assert_eq!(
            std::fs::read_to_string(predictions).unwrap(),
            "bug\n\"a, b\"\n"
        );
        assert_eq!(std::fs::read_to_string(labels).unwrap(), "bug\nfeature\n");
    }

    #[test]
    fn test_unwritable_results_dir_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("results");
        std::fs::write(&blocker, "not a directory").unwrap();

        let result = EvaluationReport::default().write(blocker.join("textcnn"), 1);

        assert!(matches!(result, Err(Error::Write { .. })));
    }

    #[test]
    fn test_streaming_accuracy_is_summarized() {
        let dir = tempfile::tempdir().unwrap();
        let examples = vec![
            Example::new(vec![0], 0),
            Example::new(vec![2], 1),
            Example::new(vec![1], 1),
        ];
        let labels = labels();

        EvaluationPass::new(10)
            .with_summary(SummaryWriter::open(dir.path()).unwrap())
            .run(
                &EchoModel,
                BatchGenerator::single_pass(&examples, &labels, 2),
                &labels,
            )
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap(),
            "step,loss,accuracy,learning_rate\n1,0.5,0.5,\n2,0.5,0.6666666666666666,\n"
        );
    }
}
