//! Per-model prediction files in the output directory

use crate::config::ModelKind;
use crate::data::Observation;
use crate::error::Result;
use crate::models::{Prediction, PredictionSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes the latest prediction of each model as `date,occupancy` CSV.
///
/// Each model owns one file named after it. A write always removes the old
/// file first, so a file never mixes rows from two runs.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the prediction of `kind`
    pub fn path_for(&self, kind: ModelKind) -> PathBuf {
        self.dir.join(kind.artifact_file_name())
    }

    /// Remove the artifact of `kind`; returns whether one existed
    pub fn clear(&self, kind: ModelKind) -> Result<bool> {
        match fs::remove_file(self.path_for(kind)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the artifact of `kind`.
    ///
    /// A missing or empty prediction only clears the old file. Returns the
    /// path written, if any.
    pub fn write(&self, kind: ModelKind, prediction: Option<&Prediction>) -> Result<Option<PathBuf>> {
        self.clear(kind)?;

        let prediction = match prediction {
            Some(p) if !p.is_empty() => p,
            _ => {
                debug!(model = %kind, "no prediction to write");
                return Ok(None);
            }
        };

        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(kind);
        let mut writer = csv::Writer::from_path(&path)?;
        for observation in prediction.observations() {
            writer.serialize(observation)?;
        }
        writer.flush()?;

        debug!(model = %kind, path = %path.display(), rows = prediction.len(), "artifact written");
        Ok(Some(path))
    }

    /// Replace the artifacts of every model family with those in `predictions`.
    ///
    /// Families without a prediction end up with no file.
    pub fn write_all(&self, predictions: &PredictionSet) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for kind in ModelKind::ALL {
            if let Some(path) = self.write(kind, predictions.get(kind))? {
                written.push(path);
            }
        }
        Ok(written)
    }

    /// Read back the artifact of `kind`, `None` if there is none
    pub fn read(&self, kind: ModelKind) -> Result<Option<Vec<Observation>>> {
        let path = self.path_for(kind);
        if !path.exists() {
            return Ok(None);
        }
        let mut reader = csv::Reader::from_path(path)?;
        let rows = reader
            .deserialize()
            .collect::<std::result::Result<Vec<Observation>, csv::Error>>()?;
        Ok(Some(rows))
    }
}
