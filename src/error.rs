use std::path::{Path, PathBuf};

/// Errors that abort a training or inference run
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration, detected before any work is done
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Malformed input text files or embedding file
    #[error("unable to load {path}: {message}")]
    DataLoad {
        /// The file that failed to load
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// An output file could not be written
    #[error("unable to write {path}: {message}")]
    Write {
        /// The file being written
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// A snapshot could not be persisted
    #[error("unable to write checkpoint for step {step}: {message}")]
    CheckpointWrite {
        /// The step being saved
        step: usize,
        /// What went wrong
        message: String,
    },

    /// Restoring was requested but no usable checkpoint exists
    #[error("unable to restore from checkpoint: {0}")]
    Restore(String),

    /// A predicted class index has no label
    #[error("no class label for index {0}")]
    UnknownClass(usize),

    /// Underlying I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Underlying JSON failure
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a `DataLoad` error for the given file
    pub fn data_load(path: impl AsRef<Path>, message: impl ToString) -> Self {
        Error::DataLoad {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }

    /// Build a `Write` error for the given file
    pub fn write(path: impl AsRef<Path>, message: impl ToString) -> Self {
        Error::Write {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
