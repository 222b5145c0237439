use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};

use derive_new::new;
use serde::Serialize;

use crate::error::{Error, Result};

/// Name of the summaries directory inside a run directory
pub static SUMMARIES_DIR: &str = "summaries";

static METRICS_FILE: &str = "metrics.csv";

/// One row of a metric stream
#[derive(Clone, Copy, Debug, PartialEq, Serialize, new)]
pub struct SummaryRecord {
    /// Global step for training rows, batch number for evaluation rows
    pub step: usize,

    /// Mean loss over the batch
    pub loss: f64,

    /// Batch accuracy for training rows, streaming accuracy for evaluation rows
    pub accuracy: f64,

    /// Learning rate of the update, empty for evaluation rows
    pub learning_rate: Option<f64>,
}

/// Appends [SummaryRecord] rows to `<dir>/metrics.csv`, flushing after every row
#[derive(Debug)]
pub struct SummaryWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl SummaryWriter {
    /// The `train` and `test` streams of a run directory
    pub fn for_run(run_dir: impl AsRef<Path>) -> Result<(Self, Self)> {
        let dir = run_dir.as_ref().join(SUMMARIES_DIR);

        Ok((Self::open(dir.join("train"))?, Self::open(dir.join("test"))?))
    }

    /// Open the stream in `dir`, appending to what a previous run left there
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| Error::write(dir, e))?;

        let path = dir.join(METRICS_FILE);
        let has_rows = fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::write(&path, e))?;

        let writer = csv::WriterBuilder::new()
            .has_headers(!has_rows)
            .from_writer(file);

        Ok(Self { path, writer })
    }

    /// The metrics file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row
    pub fn write(&mut self, record: SummaryRecord) -> Result<()> {
        self.writer
            .serialize(record)
            .map_err(|e| Error::write(&self.path, e))?;

        self.writer.flush().map_err(|e| Error::write(&self.path, e))
    }
}
