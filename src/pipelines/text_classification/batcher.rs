use burn::{
    data::dataloader,
    tensor::{backend::Backend, Int, Tensor},
};
use derive_new::new;
use rand::{rngs::StdRng, seq::SliceRandom};

use super::item::Example;
use crate::{
    datasets::{labels::LabelEncoder, seeded_rng, vocabulary::PAD_ID},
    utils::tensors::{class_ids, pad_to},
};

/// An inference batch
#[derive(Clone, Debug, new)]
pub struct Infer<B: Backend> {
    /// Token ids: [batch_size, seq_length]
    pub tokens: Tensor<B, 2, Int>,
}

/// A training batch
#[derive(Clone, Debug, new)]
pub struct Train<B: Backend> {
    /// Token ids: [batch_size, seq_length]
    pub tokens: Tensor<B, 2, Int>,

    /// Class ids: [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Turns examples into tensors on a device
#[derive(Clone, Debug, new)]
pub struct Batcher<B: Backend> {
    device: B::Device,
    seq_length: usize,
}

impl<B: Backend> dataloader::batcher::Batcher<Vec<usize>, Infer<B>> for Batcher<B> {
    fn batch(&self, items: Vec<Vec<usize>>) -> Infer<B> {
        Infer::new(pad_to(PAD_ID, items, self.seq_length, &self.device))
    }
}

impl<B: Backend> dataloader::batcher::Batcher<Example, Train<B>> for Batcher<B> {
    fn batch(&self, items: Vec<Example>) -> Train<B> {
        let targets: Vec<usize> = items.iter().map(|item| item.label).collect();
        let tokens = items.into_iter().map(|item| item.tokens).collect();

        Train::new(
            pad_to(PAD_ID, tokens, self.seq_length, &self.device),
            class_ids(&targets, &self.device),
        )
    }
}

/// A mini-batch of examples from one epoch
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    /// Zero-based epoch this batch belongs to
    pub epoch: usize,

    /// The examples, in order
    pub items: Vec<Example>,

    /// The label string of each example
    pub labels: Vec<String>,
}

impl Batch {
    /// Number of examples
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch holds no examples
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Lazily partitions a dataset into mini-batches for a fixed number of epochs.
///
/// Every epoch visits each example exactly once in contiguous chunks of `batch_size`, the last
/// chunk holding the remainder. With shuffling on, the order is redrawn at the start of every
/// epoch.
pub struct BatchGenerator<'a> {
    examples: &'a [Example],
    labels: &'a LabelEncoder,
    batch_size: usize,
    epochs: usize,
    rng: Option<StdRng>,
    order: Vec<usize>,
    epoch: usize,
    position: usize,
}

impl<'a> BatchGenerator<'a> {
    /// Create a generator over `epochs` passes
    pub fn new(
        examples: &'a [Example],
        labels: &'a LabelEncoder,
        batch_size: usize,
        epochs: usize,
        shuffle: bool,
        seed: Option<u64>,
    ) -> Self {
        let mut generator = Self {
            examples,
            labels,
            batch_size,
            epochs,
            rng: shuffle.then(|| seeded_rng(seed)),
            order: (0..examples.len()).collect(),
            epoch: 0,
            position: 0,
        };

        generator.reorder();
        generator
    }

    /// One pass in natural order, for the held-out set
    pub fn single_pass(
        examples: &'a [Example],
        labels: &'a LabelEncoder,
        batch_size: usize,
    ) -> Self {
        Self::new(examples, labels, batch_size, 1, false, None)
    }

    /// Batches in one epoch
    pub fn batches_per_epoch(&self) -> usize {
        if self.batch_size == 0 {
            0
        } else {
            self.examples.len().div_ceil(self.batch_size)
        }
    }

    /// Total batches over every epoch
    pub fn num_batches(&self) -> usize {
        self.epochs * self.batches_per_epoch()
    }

    fn reorder(&mut self) {
        if let Some(rng) = self.rng.as_mut() {
            self.order.shuffle(rng);
        }
    }
}

impl Iterator for BatchGenerator<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.examples.is_empty() || self.batch_size == 0 {
            return None;
        }

        if self.position >= self.order.len() {
            self.epoch += 1;
            self.position = 0;
            self.reorder();
        }

        if self.epoch >= self.epochs {
            return None;
        }

        let end = (self.position + self.batch_size).min(self.order.len());

        let items: Vec<Example> = self.order[self.position..end]
            .iter()
            .map(|&index| self.examples[index].clone())
            .collect();

        let labels = items
            .iter()
            .map(|item| {
                self.labels
                    .decode(item.label)
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();

        self.position = end;

        Some(Batch {
            epoch: self.epoch,
            items,
            labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, data::dataloader::batcher::Batcher as _};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::utils::tensors::to_indices;

    type TestBackend = NdArray<f32>;

    fn examples(count: usize) -> Vec<Example> {
        (0..count).map(|i| Example::new(vec![i], i % 2)).collect()
    }

    fn labels() -> LabelEncoder {
        LabelEncoder::fit(["even", "odd"])
    }

    fn ids(batch: &Batch) -> Vec<usize> {
        batch.items.iter().map(|item| item.tokens[0]).collect()
    }

    #[test]
    fn test_epochs_partition_into_remainder_batches() {
        let examples = examples(250);
        let labels = labels();

        let generator = BatchGenerator::new(&examples, &labels, 100, 3, true, Some(5));
        assert_eq!(generator.num_batches(), 9);

        let batches: Vec<Batch> = generator.collect();
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        let epochs: Vec<usize> = batches.iter().map(|batch| batch.epoch).collect();

        assert_eq!(sizes, vec![100, 100, 50, 100, 100, 50, 100, 100, 50]);
        assert_eq!(epochs, vec![0, 0, 0, 1, 1, 1, 2, 2, 2]);
    }

    #[test]
    fn test_each_epoch_covers_the_dataset_once() {
        let examples = examples(23);
        let labels = labels();

        let batches: Vec<Batch> =
            BatchGenerator::new(&examples, &labels, 5, 4, true, Some(9)).collect();

        for epoch in 0..4 {
            let mut seen: Vec<usize> = batches
                .iter()
                .filter(|batch| batch.epoch == epoch)
                .flat_map(ids)
                .collect();
            seen.sort_unstable();

            assert_eq!(seen, (0..23).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_shuffled_epochs_are_reordered_independently() {
        let examples = examples(50);
        let labels = labels();

        let orders: Vec<Vec<usize>> = BatchGenerator::new(&examples, &labels, 50, 3, true, Some(1))
            .map(|batch| ids(&batch))
            .collect();

        assert_eq!(orders.len(), 3);
        assert_ne!(orders[0], orders[1]);
        assert_ne!(orders[1], orders[2]);
    }

    #[test]
    fn test_same_seed_gives_same_order() {
        let examples = examples(30);
        let labels = labels();

        let first: Vec<Batch> =
            BatchGenerator::new(&examples, &labels, 7, 2, true, Some(42)).collect();
        let second: Vec<Batch> =
            BatchGenerator::new(&examples, &labels, 7, 2, true, Some(42)).collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_single_pass_keeps_natural_order() {
        let examples = examples(5);
        let labels = labels();

        let batches: Vec<Batch> = BatchGenerator::single_pass(&examples, &labels, 2).collect();

        assert_eq!(
            batches.iter().map(ids).collect::<Vec<_>>(),
            vec![vec![0, 1], vec![2, 3], vec![4]]
        );
        assert_eq!(batches[2].labels, vec!["even"]);
        assert_eq!(batches[1].labels, vec!["even", "odd"]);
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let labels = labels();

        let mut generator = BatchGenerator::new(&[], &labels, 10, 3, true, None);

        assert_eq!(generator.num_batches(), 0);
        assert!(generator.next().is_none());
    }

    #[test]
    fn test_batcher_builds_training_tensors() {
        let batcher = Batcher::<TestBackend>::new(Default::default(), 3);

        let train: Train<TestBackend> = batcher.batch(vec![
            Example::new(vec![4, 5, 6], 1),
            Example::new(vec![7], 0),
        ]);

        assert_eq!(train.tokens.dims(), [2, 3]);
        assert_eq!(to_indices(train.tokens), vec![4, 5, 6, 7, 0, 0]);
        assert_eq!(to_indices(train.targets), vec![1, 0]);
    }
}
