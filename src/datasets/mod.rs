use std::path::{Path, PathBuf};

use async_trait::async_trait;
use derive_new::new;
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    error::{Error, Result},
    pipelines::text_classification::item::Example,
    training::Config,
};

/// Pretrained word vectors
pub mod embeddings;

/// Sorted label encoding
pub mod labels;

/// Tokenization and the token vocabulary
pub mod vocabulary;

pub use embeddings::EmbeddingTable;
pub use labels::LabelEncoder;
pub use vocabulary::{tokenize, Vocabulary};

/// A raw labeled document
#[derive(Clone, Debug, PartialEq, Eq, new)]
pub struct Document {
    /// The document text
    pub text: String,

    /// The label string
    pub label: String,
}

/// A source of labeled documents
#[async_trait]
pub trait TextSource {
    /// Read every document
    async fn documents(&self) -> Result<Vec<Document>>;
}

/// A delimited text file with a header row naming the text and label columns
#[derive(Clone, Debug, new)]
pub struct CsvSource {
    path: PathBuf,
    text_column: String,
    label_column: String,
}

impl CsvSource {
    /// The numbered file `<data_dir>/<index>.csv`
    pub fn numbered(config: &Config, index: usize) -> Self {
        Self::new(
            config.data_path().join(format!("{index}.csv")),
            config.text_column.clone(),
            config.label_column.clone(),
        )
    }

    fn column(&self, headers: &csv::StringRecord, name: &str) -> Result<usize> {
        headers
            .iter()
            .position(|header| header.trim() == name)
            .ok_or_else(|| Error::data_load(&self.path, format!("missing column {name:?}")))
    }
}

#[async_trait]
impl TextSource for CsvSource {
    async fn documents(&self) -> Result<Vec<Document>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::data_load(&self.path, e))?;

        let mut reader = csv::Reader::from_reader(bytes.as_slice());

        let headers = reader
            .headers()
            .map_err(|e| Error::data_load(&self.path, e))?
            .clone();

        let text = self.column(&headers, &self.text_column)?;
        let label = self.column(&headers, &self.label_column)?;

        let mut documents = Vec::new();

        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| Error::data_load(&self.path, e))?;

            match (record.get(text), record.get(label)) {
                (Some(text), Some(label)) => {
                    documents.push(Document::new(text.to_string(), label.to_string()))
                }
                _ => {
                    return Err(Error::data_load(
                        &self.path,
                        format!("row {} is missing a column", row + 1),
                    ))
                }
            }
        }

        Ok(documents)
    }
}

/// Everything the training run needs from the input files
#[derive(Debug, Clone)]
pub struct Corpus {
    /// Training examples
    pub train: Vec<Example>,

    /// Held-out examples
    pub dev: Vec<Example>,

    /// The token vocabulary
    pub vocabulary: Vocabulary,

    /// The class labels
    pub labels: LabelEncoder,

    /// Pretrained vectors aligned with the vocabulary, when the embedding mode uses them
    pub embedding: Option<EmbeddingTable>,

    /// The padded length of every example
    pub seq_length: usize,
}

impl Corpus {
    /// Tokenize and encode the documents, and load the pretrained vectors
    pub async fn build(
        config: &Config,
        train: Vec<Document>,
        dev: Vec<Document>,
    ) -> Result<Self> {
        if train.is_empty() {
            return Err(Error::data_load(
                config.data_path(),
                "the training set is empty",
            ));
        }

        let labels = LabelEncoder::fit(
            train
                .iter()
                .chain(dev.iter())
                .map(|document| document.label.as_str()),
        );

        let train_tokens: Vec<Vec<String>> =
            train.iter().map(|document| tokenize(&document.text)).collect();
        let dev_tokens: Vec<Vec<String>> =
            dev.iter().map(|document| tokenize(&document.text)).collect();

        let vocabulary = Vocabulary::build(
            train_tokens
                .iter()
                .chain(dev_tokens.iter())
                .map(Vec::as_slice),
        );

        let longest = train_tokens
            .iter()
            .chain(dev_tokens.iter())
            .map(Vec::len)
            .max()
            .unwrap_or(0);

        let seq_length = sequence_length(config, longest);

        let encode = |documents: &[Document], tokens: &[Vec<String>]| -> Vec<Example> {
            documents
                .iter()
                .zip(tokens)
                .filter_map(|(document, tokens)| {
                    labels
                        .encode(&document.label)
                        .map(|label| Example::new(vocabulary.encode(tokens, seq_length), label))
                })
                .collect()
        };

        let train = encode(&train, &train_tokens);
        let dev = encode(&dev, &dev_tokens);

        let embedding = match (&config.embedding_file, config.embedding_mode.uses_pretrained()) {
            (Some(file), true) => {
                let path = embedding_path(config, file);
                let mut rng = seeded_rng(config.seed);

                let (table, found) =
                    EmbeddingTable::load(&path, &vocabulary, config.embedding_dim, &mut rng)
                        .await?;

                log::info!(
                    "Found {found} of {} vocabulary tokens in {}",
                    vocabulary.len(),
                    path.display()
                );

                Some(table)
            }
            (None, true) => {
                return Err(Error::Configuration(format!(
                    "embedding mode {} needs an embedding_file",
                    config.embedding_mode
                )))
            }
            (_, false) => None,
        };

        Ok(Self {
            train,
            dev,
            vocabulary,
            labels,
            embedding,
            seq_length,
        })
    }
}

/// Read the numbered data files and build the corpus
pub async fn load(config: &Config) -> Result<Corpus> {
    let mut train = Vec::new();

    for index in 0..config.train_index {
        let documents = CsvSource::numbered(config, index).documents().await?;

        log::info!("Read {} training documents from {index}.csv", documents.len());

        train.extend(documents);
    }

    let dev = CsvSource::numbered(config, config.train_index)
        .documents()
        .await?;

    log::info!(
        "Read {} held-out documents from {}.csv",
        dev.len(),
        config.train_index
    );

    let corpus = Corpus::build(config, train, dev).await?;

    log::info!(
        "Vocabulary size: {}, classes: {}, sequence length: {}",
        corpus.vocabulary.len(),
        corpus.labels.len(),
        corpus.seq_length
    );

    Ok(corpus)
}

/// The longest document, raised to the architecture minimum and capped by `max_seq_length`
pub fn sequence_length(config: &Config, longest: usize) -> usize {
    let minimum = config
        .architecture
        .min_seq_length(&config.filter_sizes)
        .max(1);

    let length = longest.max(minimum);

    match config.max_seq_length {
        Some(cap) => length.min(cap).max(minimum),
        None => length,
    }
}

/// A random generator seeded from the config when a seed is set
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn embedding_path(config: &Config, file: &str) -> PathBuf {
    let path = Path::new(file);

    if path.is_absolute() || path.exists() {
        path.to_path_buf()
    } else {
        config.data_path().join(path)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{models::Architecture, training::EmbeddingMode};

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    fn config(dir: &Path) -> Config {
        Config::new()
            .with_data_dir(dir.to_string_lossy().to_string())
            .with_architecture(Architecture::TextCnn)
            .with_filter_sizes(vec![3])
            .with_embedding_dim(2)
            .with_embedding_mode(EmbeddingMode::Random)
            .with_seed(Some(11))
    }

    #[tokio::test]
    async fn test_csv_source_reads_named_columns() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "0.csv",
            "id,label,text\n1,bug,\"crash, on start\"\n2,feature,add dark mode\n",
        );

        let source = CsvSource::new(
            dir.path().join("0.csv"),
            "text".to_string(),
            "label".to_string(),
        );

        assert_eq!(
            source.documents().await.unwrap(),
            vec![
                Document::new("crash, on start".to_string(), "bug".to_string()),
                Document::new("add dark mode".to_string(), "feature".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_csv_source_rejects_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0.csv", "body,label\nhello,a\n");

        let source = CsvSource::new(
            dir.path().join("0.csv"),
            "text".to_string(),
            "label".to_string(),
        );

        assert!(matches!(
            source.documents().await,
            Err(Error::DataLoad { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_builds_padded_examples() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0.csv", "text,label\ngood movie,pos\nawful,neg\n");
        write(dir.path(), "1.csv", "text,label\ngood fun film today,pos\n");

        let corpus = load(&config(dir.path())).await.unwrap();

        assert_eq!(corpus.labels.classes(), ["neg", "pos"]);
        assert_eq!(corpus.seq_length, 4);
        assert_eq!(corpus.train.len(), 2);
        assert_eq!(corpus.dev.len(), 1);
        assert_eq!(corpus.train[0], Example::new(vec![2, 3, 0, 0], 1));
        assert_eq!(corpus.train[1], Example::new(vec![4, 0, 0, 0], 0));
        assert_eq!(corpus.dev[0], Example::new(vec![2, 5, 6, 7], 1));
        assert!(corpus.embedding.is_none());
    }

    #[tokio::test]
    async fn test_load_rejects_empty_training_set() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0.csv", "text,label\n");
        write(dir.path(), "1.csv", "text,label\nhello,a\n");

        let result = load(&config(dir.path())).await;

        assert!(matches!(result, Err(Error::DataLoad { .. })));
    }

    #[tokio::test]
    async fn test_load_reads_pretrained_vectors() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0.csv", "text,label\ngood,pos\n");
        write(dir.path(), "1.csv", "text,label\nbad,neg\n");
        write(dir.path(), "vectors.txt", "good 0.5 0.5\n");

        let config = config(dir.path())
            .with_embedding_mode(EmbeddingMode::Static)
            .with_embedding_file(Some("vectors.txt".to_string()));

        let corpus = load(&config).await.unwrap();
        let table = corpus.embedding.unwrap();

        assert_eq!(table.len(), corpus.vocabulary.len());
        assert_eq!(table.row(corpus.vocabulary.id("good")), [0.5, 0.5]);
    }

    #[test]
    fn test_sequence_length_respects_minimum_and_cap() {
        let config = Config::new()
            .with_architecture(Architecture::HierarchicalCnn)
            .with_filter_sizes(vec![3]);

        assert_eq!(sequence_length(&config, 4), 9);
        assert_eq!(sequence_length(&config, 40), 40);
        assert_eq!(
            sequence_length(&config.clone().with_max_seq_length(Some(20)), 40),
            20
        );
        assert_eq!(
            sequence_length(&config.with_max_seq_length(Some(5)), 40),
            9
        );
    }
}
