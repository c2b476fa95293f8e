//! Context snapshot persistence
//!
//! The orchestrator hands a finished run's snapshot to a [`SnapshotSink`].
//! Saving is best effort: a failing sink is logged and never changes the
//! outcome of the run.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Errors raised while saving a snapshot
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Failed to write snapshot to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode snapshot: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Destination for context snapshots
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn save(&self, snapshot: &serde_json::Value, run_id: &str) -> Result<(), PersistError>;
}

/// Writes `pipeline_context_<run_id>.json` files into one directory
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a snapshot for `run_id` is written to
    pub fn path_for(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("pipeline_context_{run_id}.json"))
    }
}

#[async_trait]
impl SnapshotSink for JsonFileSink {
    async fn save(&self, snapshot: &serde_json::Value, run_id: &str) -> Result<(), PersistError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| PersistError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.path_for(run_id);
        let body = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|source| PersistError::Io {
                path: path.clone(),
                source,
            })?;

        info!("Saved pipeline context to {}", path.display());
        Ok(())
    }
}
