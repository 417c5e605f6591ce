//! Fitted artifact persistence

use crate::config::PathsConfig;
use crate::error::{Error, Result};
use crate::models::anomaly::AnomalyModel;
use crate::preprocess::PreprocessorState;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Preprocessor and model state loaded together
#[derive(Debug, Clone, PartialEq)]
pub struct FittedPipeline {
    pub preprocessor: PreprocessorState,
    pub model: AnomalyModel,
}

impl FittedPipeline {
    /// Both halves must agree on the feature layout
    pub fn check_schema(&self) -> Result<()> {
        self.preprocessor.check_schema()?;
        if self.preprocessor.n_features() != self.model.n_features() {
            return Err(Error::Load(format!(
                "preprocessor emits {} features but model expects {}",
                self.preprocessor.n_features(),
                self.model.n_features()
            )));
        }
        Ok(())
    }
}

/// Reads and writes the two fitted artifacts as JSON files
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    preprocessor_path: PathBuf,
    model_path: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>, M: AsRef<Path>>(preprocessor_path: P, model_path: M) -> Self {
        Self {
            preprocessor_path: preprocessor_path.as_ref().to_path_buf(),
            model_path: model_path.as_ref().to_path_buf(),
        }
    }

    pub fn from_config(paths: &PathsConfig) -> Self {
        Self::new(&paths.preprocessor, &paths.model)
    }

    /// Store rooted in a directory with the default file names
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join("preprocessor.json"), dir.join("fraud_model.json"))
    }

    pub fn preprocessor_path(&self) -> &Path {
        &self.preprocessor_path
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Persist both fitted states
    pub fn save(&self, pipeline: &FittedPipeline) -> Result<()> {
        write_json(&self.preprocessor_path, &pipeline.preprocessor)?;
        write_json(&self.model_path, &pipeline.model)?;
        info!(
            preprocessor = %self.preprocessor_path.display(),
            model = %self.model_path.display(),
            "Artifacts saved"
        );
        Ok(())
    }

    /// Load both fitted states and verify they fit together
    pub fn load(&self) -> Result<FittedPipeline> {
        let preprocessor: PreprocessorState = read_json(&self.preprocessor_path)?;
        let model: AnomalyModel = read_json(&self.model_path)?;
        let pipeline = FittedPipeline {
            preprocessor,
            model,
        };
        pipeline.check_schema()?;

        info!(
            strategy = pipeline.model.strategy().as_str(),
            features = pipeline.preprocessor.n_features(),
            "Artifacts loaded"
        );
        Ok(pipeline)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Persist(format!("cannot create {}: {}", parent.display(), e)))?;
    }
    let file = File::create(path)
        .map_err(|e| Error::Persist(format!("cannot write {}: {}", path.display(), e)))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)
        .map_err(|e| Error::Persist(format!("cannot serialize {}: {}", path.display(), e)))?;
    writer
        .flush()
        .map_err(|e| Error::Persist(format!("cannot write {}: {}", path.display(), e)))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .map_err(|e| Error::Load(format!("cannot open {}: {}", path.display(), e)))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::Load(format!("corrupt artifact {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_artifacts_are_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::in_dir(dir.path());
        assert!(matches!(store.load(), Err(Error::Load(_))));
    }

    #[test]
    fn test_corrupt_artifact_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::in_dir(dir.path());
        fs::write(store.preprocessor_path(), b"{\"numerical\": [").unwrap();
        fs::write(store.model_path(), b"{}").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::Load(_)));
        assert!(err.to_string().contains("corrupt"));
    }
}
