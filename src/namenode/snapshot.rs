//! Namespace snapshot persistence.
//!
//! The whole namespace is rewritten after every mutation. Writes go to a
//! sibling `.tmp` file which is fsynced and then renamed over the snapshot, so
//! a crash mid-write leaves the previous snapshot intact.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::namespace::Namespace;
use crate::error::{DfsError, Result};

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Loads the namespace. A missing snapshot is an empty namespace; an
    /// unreadable one is an error unless `reset_on_corrupt` is set.
    pub async fn load(&self, reset_on_corrupt: bool) -> Result<Namespace> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "No snapshot at {}, starting with an empty namespace",
                    self.path.display()
                );
                return Ok(Namespace::default());
            }
            Err(e) => return self.unreadable(e.to_string(), reset_on_corrupt),
        };

        match serde_json::from_slice::<Namespace>(&content) {
            Ok(namespace) => {
                tracing::info!(
                    "Loaded snapshot {} ({} files)",
                    self.path.display(),
                    namespace.files.len()
                );
                Ok(namespace)
            }
            Err(e) => self.unreadable(e.to_string(), reset_on_corrupt),
        }
    }

    fn unreadable(&self, reason: String, reset_on_corrupt: bool) -> Result<Namespace> {
        if reset_on_corrupt {
            tracing::warn!(
                "Snapshot {} is unreadable ({}), starting with an empty namespace",
                self.path.display(),
                reason
            );
            return Ok(Namespace::default());
        }
        Err(DfsError::Snapshot(format!(
            "{} is unreadable: {}",
            self.path.display(),
            reason
        )))
    }

    pub async fn save(&self, namespace: &Namespace) -> Result<()> {
        let encoded = serde_json::to_vec_pretty(namespace)
            .map_err(|e| DfsError::Snapshot(format!("Failed to encode namespace: {}", e)))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = self.temp_path();
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(&encoded).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.path).await?;
        tracing::debug!(
            "Persisted snapshot {} ({} bytes)",
            self.path.display(),
            encoded.len()
        );
        Ok(())
    }
}
