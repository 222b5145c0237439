use std::path::Path;

use burn::tensor::{backend::Backend, Data, Shape, Tensor};
use rand::{rngs::StdRng, Rng};

use super::vocabulary::{Vocabulary, PAD_ID};
use crate::{
    error::{Error, Result},
    utils::files::file_reader,
};

/// Bound of the uniform distribution used for words without a pretrained vector
pub const RANDOM_RANGE: f32 = 0.25;

/// A row-major [vocab_size, dim] table of word vectors aligned with a vocabulary
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingTable {
    dim: usize,
    values: Vec<f32>,
}

impl EmbeddingTable {
    /// A table with a zero pad row and uniformly random rows everywhere else
    pub fn random(vocab_size: usize, dim: usize, rng: &mut StdRng) -> Self {
        let mut values: Vec<f32> = (0..vocab_size * dim)
            .map(|_| rng.gen_range(-RANDOM_RANGE..RANDOM_RANGE))
            .collect();

        if vocab_size > PAD_ID {
            values[PAD_ID * dim..(PAD_ID + 1) * dim].fill(0.0);
        }

        Self { dim, values }
    }

    /// Load the vectors of every vocabulary token found in a whitespace separated text file.
    ///
    /// Each line is `token v1 v2 ... vD`. A leading `count dim` line is accepted and checked
    /// against `dim`. Tokens missing from the file keep a random row. Returns the table and the
    /// number of vocabulary tokens that were found.
    pub async fn load(
        path: impl AsRef<Path>,
        vocabulary: &Vocabulary,
        dim: usize,
        rng: &mut StdRng,
    ) -> Result<(Self, usize)> {
        let path = path.as_ref();
        let mut table = Self::random(vocabulary.len(), dim, rng);
        let mut found = 0;

        let mut lines = file_reader(path)
            .await
            .map_err(|e| Error::data_load(path, e))?;

        let mut line_number = 0;

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| Error::data_load(path, e))?
        {
            line_number += 1;

            let mut fields = line.split_whitespace();
            let Some(token) = fields.next() else {
                continue;
            };
            let rest: Vec<&str> = fields.collect();

            if line_number == 1 && rest.len() == 1 && token.parse::<usize>().is_ok() {
                let header_dim = rest[0].parse::<usize>().map_err(|e| {
                    Error::data_load(path, format!("invalid header dimension: {e}"))
                })?;

                if header_dim != dim {
                    return Err(Error::data_load(
                        path,
                        format!("vectors have dimension {header_dim}, expected {dim}"),
                    ));
                }

                continue;
            }

            if rest.len() != dim {
                return Err(Error::data_load(
                    path,
                    format!(
                        "line {line_number} has {} values, expected {dim}",
                        rest.len()
                    ),
                ));
            }

            let Some(id) = vocabulary.get(token) else {
                continue;
            };

            let vector = rest
                .iter()
                .map(|value| value.parse::<f32>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::data_load(path, format!("line {line_number}: {e}")))?;

            table.values[id * dim..(id + 1) * dim].copy_from_slice(&vector);
            found += 1;
        }

        Ok((table, found))
    }

    /// Width of each vector
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.values.len() / self.dim
        }
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The vector of a token id
    pub fn row(&self, id: usize) -> &[f32] {
        &self.values[id * self.dim..(id + 1) * self.dim]
    }

    /// Copy the table into a [vocab_size, dim] float tensor
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        Tensor::from_data(
            Data::<f32, 2>::new(self.values.clone(), Shape::new([self.len(), self.dim]))
                .convert::<B::FloatElem>(),
            device,
        )
    }
}
