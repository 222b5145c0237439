use std::{
    fs, io,
    path::{Path, PathBuf},
};

use burn::{
    module::{AutodiffModule, Module},
    optim::Optimizer,
    record::{CompactRecorder, FileRecorder, Recorder},
    tensor::backend::{AutodiffBackend, Backend},
};
use serde::{Deserialize, Serialize};

use super::{Checkpointer, Session};
use crate::{
    error::{Error, Result},
    models::Classifier,
};

/// Name of the snapshot directory inside a run directory
pub static CHECKPOINTS_DIR: &str = "checkpoints";

static INDEX_FILE: &str = "checkpoints.json";

/// The retained steps, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CheckpointIndex {
    steps: Vec<usize>,
}

/// Saves model records with the compact recorder and keeps the newest `keep` of them
#[derive(Debug)]
pub struct CheckpointManager {
    dir: PathBuf,
    keep: usize,
    index: CheckpointIndex,
}

impl CheckpointManager {
    /// Start a fresh run, removing whatever a previous run left in `run_dir`
    pub fn create(run_dir: impl AsRef<Path>, keep: usize) -> Result<Self> {
        let run_dir = run_dir.as_ref();

        if run_dir.exists() {
            fs::remove_dir_all(run_dir)?;
        }

        let dir = run_dir.join(CHECKPOINTS_DIR);
        fs::create_dir_all(&dir)?;

        let manager = Self {
            dir,
            keep,
            index: CheckpointIndex::default(),
        };
        manager.write_index()?;

        Ok(manager)
    }

    /// Open the snapshots of an existing run
    pub fn open(run_dir: impl AsRef<Path>, keep: usize) -> Result<Self> {
        let dir = run_dir.as_ref().join(CHECKPOINTS_DIR);
        let path = dir.join(INDEX_FILE);

        let contents = fs::read_to_string(&path).map_err(|e| {
            Error::Restore(format!("no checkpoint index at {}: {e}", path.display()))
        })?;

        let index: CheckpointIndex = serde_json::from_str(&contents)
            .map_err(|e| Error::Restore(format!("invalid checkpoint index: {e}")))?;

        if index.steps.is_empty() {
            return Err(Error::Restore(format!(
                "no checkpoints in {}",
                dir.display()
            )));
        }

        Ok(Self { dir, keep, index })
    }

    /// The retained steps, oldest first
    pub fn steps(&self) -> &[usize] {
        &self.index.steps
    }

    /// The newest retained step
    pub fn latest(&self) -> Option<usize> {
        self.index.steps.last().copied()
    }

    /// Record `model` as the snapshot for `step`, evicting the oldest beyond the limit
    pub fn save<B: Backend, M: Module<B>>(&mut self, model: &M, step: usize) -> Result<()> {
        CompactRecorder::new()
            .record(model.clone().into_record(), self.record_path(step))
            .map_err(|e| Error::CheckpointWrite {
                step,
                message: e.to_string(),
            })?;

        self.index.steps.retain(|&saved| saved != step);
        self.index.steps.push(step);

        let excess = self.index.steps.len().saturating_sub(self.keep);
        let evicted: Vec<usize> = self.index.steps.drain(..excess).collect();

        self.write_index().map_err(|e| Error::CheckpointWrite {
            step,
            message: e.to_string(),
        })?;

        for evicted in evicted {
            match fs::remove_file(self.file_path::<B>(evicted)) {
                Ok(()) => log::debug!("Evicted checkpoint {evicted}"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::warn!("Checkpoint {evicted} was already gone")
                }
                Err(e) => {
                    return Err(Error::CheckpointWrite {
                        step,
                        message: format!("unable to evict step {evicted}: {e}"),
                    })
                }
            }
        }

        log::info!(
            "Saved model checkpoint to {}",
            self.file_path::<B>(step).display()
        );

        Ok(())
    }

    /// Load the newest snapshot into `model`, returning it with its step
    pub fn restore<B: Backend, M: Module<B>>(
        &self,
        model: M,
        device: &B::Device,
    ) -> Result<(M, usize)> {
        let step = self
            .latest()
            .ok_or_else(|| Error::Restore(format!("no checkpoints in {}", self.dir.display())))?;

        let record = CompactRecorder::new()
            .load(self.record_path(step), device)
            .map_err(|e| Error::Restore(format!("unable to load step {step}: {e}")))?;

        log::info!("Restored model checkpoint from step {step}");

        Ok((model.load_record(record), step))
    }

    /// Recorder path, without the extension the recorder appends
    fn record_path(&self, step: usize) -> PathBuf {
        self.dir.join(format!("model-{step}"))
    }

    /// The file the recorder writes for `step`
    fn file_path<B: Backend>(&self, step: usize) -> PathBuf {
        self.record_path(step)
            .with_extension(<CompactRecorder as FileRecorder<B>>::file_extension())
    }

    fn write_index(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.index)?;
        fs::write(self.dir.join(INDEX_FILE), json)?;

        Ok(())
    }
}

impl<B, M, O> Checkpointer<Session<B, M, O>> for CheckpointManager
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Classifier<B>,
    M::InnerModule: Classifier<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    fn checkpoint(&mut self, session: &Session<B, M, O>, step: usize) -> Result<()> {
        self.save::<B, M>(session.model(), step)
    }
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::NdArray,
        module::Param,
        nn::{Linear, LinearConfig},
        tensor::Tensor,
    };
    use pretty_assertions::assert_eq;

    use super::*;

    type TestBackend = NdArray<f32>;

    fn model(fill: f32) -> Linear<TestBackend> {
        let device = Default::default();
        let mut linear = LinearConfig::new(2, 2).init::<TestBackend>(&device);
        linear.weight = Param::from_tensor(Tensor::ones([2, 2], &device).mul_scalar(fill));
        linear
    }

    #[test]
    fn test_retention_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::create(dir.path().join("textcnn"), 2).unwrap();

        for step in [3, 6, 9] {
            manager.save::<TestBackend, _>(&model(1.0), step).unwrap();
        }

        let checkpoints = dir.path().join("textcnn").join(CHECKPOINTS_DIR);

        assert_eq!(manager.steps(), [6, 9]);
        assert!(!checkpoints.join("model-3.mpk").exists());
        assert!(checkpoints.join("model-6.mpk").exists());
        assert!(checkpoints.join("model-9.mpk").exists());
    }

    #[test]
    fn test_keeping_one_replaces_the_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::create(dir.path(), 1).unwrap();

        manager.save::<TestBackend, _>(&model(1.0), 1).unwrap();
        manager.save::<TestBackend, _>(&model(2.0), 2).unwrap();

        let checkpoints = dir.path().join(CHECKPOINTS_DIR);
        let mut files: Vec<String> = fs::read_dir(&checkpoints)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        files.sort();

        assert_eq!(manager.steps(), [2]);
        assert_eq!(files, vec!["checkpoints.json", "model-2.mpk"]);
        assert_eq!(CheckpointManager::open(dir.path(), 1).unwrap().steps(), [2]);
    }

    #[test]
    fn test_eviction_tolerates_a_missing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::create(dir.path(), 1).unwrap();

        manager.save::<TestBackend, _>(&model(1.0), 1).unwrap();
        fs::remove_file(dir.path().join(CHECKPOINTS_DIR).join("model-1.mpk")).unwrap();
        manager.save::<TestBackend, _>(&model(2.0), 2).unwrap();

        assert_eq!(CheckpointManager::open(dir.path(), 1).unwrap().steps(), [2]);
    }

    #[test]
    fn test_saving_a_step_twice_keeps_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::create(dir.path(), 5).unwrap();

        manager.save::<TestBackend, _>(&model(1.0), 4).unwrap();
        manager.save::<TestBackend, _>(&model(1.0), 4).unwrap();

        assert_eq!(manager.steps(), [4]);
    }

    #[test]
    fn test_restore_loads_latest() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::create(dir.path(), 5).unwrap();

        manager.save::<TestBackend, _>(&model(1.0), 1).unwrap();
        manager.save::<TestBackend, _>(&model(2.0), 2).unwrap();

        let reopened = CheckpointManager::open(dir.path(), 5).unwrap();
        let (restored, step) = reopened
            .restore::<TestBackend, _>(model(0.0), &Default::default())
            .unwrap();

        assert_eq!(step, 2);
        assert_eq!(restored.weight.val().into_data().value, vec![2.0; 4]);
    }

    #[test]
    fn test_create_wipes_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::create(dir.path(), 5).unwrap();
        manager.save::<TestBackend, _>(&model(1.0), 1).unwrap();

        let manager = CheckpointManager::create(dir.path(), 5).unwrap();

        assert!(manager.steps().is_empty());
        assert!(matches!(
            CheckpointManager::open(dir.path(), 5),
            Err(Error::Restore(_))
        ));
    }

    #[test]
    fn test_open_without_run_fails() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            CheckpointManager::open(dir.path().join("missing"), 5),
            Err(Error::Restore(_))
        ));
    }
}
