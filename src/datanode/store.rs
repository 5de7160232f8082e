//! On-disk block storage.
//!
//! Each block is one file named after its id under the node's storage
//! directory. Blocks are written to a uniquely named temporary file and
//! renamed into place, so readers only ever see complete blocks.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::{DfsError, Result};
use crate::namenode::types::BlockId;

const TEMP_SUFFIX: &str = ".tmp";

pub struct BlockStore {
    root: PathBuf,
    /// Block id -> size in bytes of every block held.
    index: DashMap<BlockId, u64>,
}

impl BlockStore {
    /// Opens (creating if needed) the storage directory and indexes the
    /// blocks already in it. Leftover temporary files are removed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        let index = DashMap::new();
        let mut entries = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(TEMP_SUFFIX) {
                tracing::debug!("Removing stale temporary file {}", name);
                tokio::fs::remove_file(entry.path()).await?;
                continue;
            }

            let metadata = entry.metadata().await?;
            if metadata.is_file() && is_valid_block_id(&name) {
                index.insert(BlockId(name), metadata.len());
            }
        }

        tracing::info!(
            "Block store {} opened with {} blocks",
            root.display(),
            index.len()
        );
        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains(&self, block_id: &BlockId) -> bool {
        self.index.contains_key(block_id)
    }

    pub fn block_size(&self, block_id: &BlockId) -> Option<u64> {
        self.index.get(block_id).map(|size| *size)
    }

    pub fn block_count(&self) -> usize {
        self.index.len()
    }

    pub fn block_path(&self, block_id: &BlockId) -> Result<PathBuf> {
        validate_block_id(block_id)?;
        Ok(self.root.join(block_id.as_str()))
    }

    /// Stores a complete block, replacing any previous copy.
    pub async fn write(&self, block_id: &BlockId, data: &[u8]) -> Result<()> {
        let path = self.block_path(block_id)?;
        let temp_path = self
            .root
            .join(format!("{}.{}{}", block_id, uuid::Uuid::new_v4(), TEMP_SUFFIX));

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp_path, &path).await?;

        self.index.insert(block_id.clone(), data.len() as u64);
        tracing::debug!("Stored block {} ({} bytes)", block_id, data.len());
        Ok(())
    }

    /// Opens a held block for streaming. Ids missing from the index are
    /// `BlockNotFound` without touching the disk.
    pub async fn open_block(&self, block_id: &BlockId) -> Result<tokio::fs::File> {
        let path = self.block_path(block_id)?;
        if !self.contains(block_id) {
            return Err(DfsError::BlockNotFound(block_id.clone()));
        }
        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.index.remove(block_id);
                Err(DfsError::BlockNotFound(block_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn read(&self, block_id: &BlockId) -> Result<Vec<u8>> {
        let path = self.block_path(block_id)?;
        if !self.contains(block_id) {
            return Err(DfsError::BlockNotFound(block_id.clone()));
        }
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.index.remove(block_id);
                Err(DfsError::BlockNotFound(block_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn is_valid_block_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Block ids become file names, so only `[A-Za-z0-9_-]` is accepted.
pub fn validate_block_id(block_id: &BlockId) -> Result<()> {
    if is_valid_block_id(block_id.as_str()) {
        Ok(())
    } else {
        Err(DfsError::InvalidBlockId(block_id.to_string()))
    }
}
