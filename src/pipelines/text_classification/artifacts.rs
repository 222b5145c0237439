use std::{fs, path::Path};

use burn::config::Config as _;
use serde::{Deserialize, Serialize};

use crate::{
    datasets::{tokenize, LabelEncoder, Vocabulary},
    error::{Error, Result},
    models::ModelConfig,
    training::Config,
};

/// The experiment configuration
pub static CONFIG_FILE: &str = "config.json";

/// The architecture and its parameters
pub static MODEL_FILE: &str = "model.json";

/// The vocabulary, class labels and sequence length
pub static VOCABULARY_FILE: &str = "vocabulary.json";

/// What it takes to turn raw text into model input and model output back into labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encoding {
    /// The token vocabulary
    pub vocabulary: Vocabulary,

    /// The class labels
    pub labels: LabelEncoder,

    /// The padded sequence length
    pub seq_length: usize,
}

impl Encoding {
    /// Tokenize and encode a text to exactly `seq_length` ids
    pub fn encode(&self, text: &str) -> Vec<usize> {
        self.vocabulary.encode(&tokenize(text), self.seq_length)
    }
}

/// Write every artifact needed to rebuild the model for inference
pub fn save(
    run_dir: &Path,
    config: &Config,
    model: &ModelConfig,
    encoding: &Encoding,
) -> Result<()> {
    fs::create_dir_all(run_dir)?;

    config
        .save(run_dir.join(CONFIG_FILE))
        .map_err(|e| Error::Configuration(format!("unable to save config: {e}")))?;

    fs::write(
        run_dir.join(MODEL_FILE),
        serde_json::to_string_pretty(model)?,
    )?;
    fs::write(
        run_dir.join(VOCABULARY_FILE),
        serde_json::to_string(encoding)?,
    )?;

    Ok(())
}

/// Read the artifacts written by [save]
pub fn load(run_dir: &Path) -> Result<(Config, ModelConfig, Encoding)> {
    let config_path = run_dir.join(CONFIG_FILE);
    let config = Config::load(&config_path).map_err(|e| Error::data_load(&config_path, e))?;

    let model = serde_json::from_str(&read(&run_dir.join(MODEL_FILE))?)?;
    let encoding = serde_json::from_str(&read(&run_dir.join(VOCABULARY_FILE))?)?;

    Ok((config, model, encoding))
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::data_load(path, e))
}
