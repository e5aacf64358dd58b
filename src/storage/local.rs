//! Local filesystem checkpoint store.
//!
//! Saves go through a sibling `.part` file that is renamed over the target,
//! so an interrupted save leaves the previous checkpoint intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::CheckpointState;
use crate::storage::CheckpointStore;

/// Checkpoint stored as a JSON file.
#[derive(Debug, Clone)]
pub struct LocalCheckpointStore {
    path: PathBuf,
}

impl LocalCheckpointStore {
    /// Create a store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Temporary sibling used for atomic replacement.
    fn part_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint".into());
        name.push(".part");
        self.path.with_file_name(name)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let tmp = self.part_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read and decode the checkpoint, surfacing every failure.
    pub async fn try_load(&self) -> Result<Option<CheckpointState>> {
        match self.read_bytes().await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CheckpointStore for LocalCheckpointStore {
    async fn load(&self) -> CheckpointState {
        match self.try_load().await {
            Ok(Some(state)) => {
                log::info!("Found save data: {}", self.path.display());
                state
            }
            Ok(None) => {
                log::info!(
                    "No save data found at {}, starting fresh",
                    self.path.display()
                );
                CheckpointState::default()
            }
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable save data at {}: {}",
                    self.path.display(),
                    e
                );
                CheckpointState::default()
            }
        }
    }

    async fn save(&self, state: &CheckpointState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        self.write_bytes(&bytes).await?;
        log::info!("Data saved: {}", self.path.display());
        Ok(())
    }
}
