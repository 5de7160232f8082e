use std::sync::Arc;
use tokio::sync::RwLock;

use super::namespace::{DirEntry, Namespace, normalize_path};
use super::snapshot::SnapshotStore;
use super::types::{BlockAssignment, BlockId, FileEntry, block_count};
use crate::cluster::placement::PlacementEngine;
use crate::cluster::probe::MetricsProbe;
use crate::config::{ClusterConfig, ReplicationConfig};
use crate::error::{DfsError, Result};

/// The coordinator: owns the namespace and asks the placement engine where
/// each new block goes.
///
/// Mutations run one at a time under the namespace write lock, and are applied
/// to a staged copy that only replaces the live namespace once its snapshot is
/// on disk.
pub struct NameNode {
    namespace: RwLock<Namespace>,
    placement: PlacementEngine,
    snapshots: SnapshotStore,
    block_size: u64,
    replication_factor: usize,
    max_file_size: u64,
}

impl NameNode {
    pub fn new(
        namespace: Namespace,
        placement: PlacementEngine,
        snapshots: SnapshotStore,
        block_size: u64,
        replication_factor: usize,
    ) -> Self {
        Self {
            namespace: RwLock::new(namespace),
            placement,
            snapshots,
            block_size,
            replication_factor,
            max_file_size: ReplicationConfig::default().max_file_size,
        }
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Builds a namenode from the cluster config, reloading the snapshot.
    pub async fn open(config: &ClusterConfig, probe: Arc<dyn MetricsProbe>) -> Result<Arc<Self>> {
        let snapshots = SnapshotStore::new(&config.namenode.snapshot_path);
        let namespace = snapshots
            .load(config.namenode.reset_on_corrupt_snapshot)
            .await?;
        let placement =
            PlacementEngine::new(config.datanode_descriptors(), probe, &config.placement);

        tracing::info!(
            "Namenode ready: {} datanodes, replication factor {}, block size {}",
            placement.nodes().len(),
            config.replication.factor,
            config.replication.block_size
        );

        Ok(Arc::new(Self::new(
            namespace,
            placement,
            snapshots,
            config.replication.block_size,
            config.replication.factor,
        )
        .with_max_file_size(config.replication.max_file_size)))
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    /// Allocates blocks for a new file and registers it.
    pub async fn create_file(&self, path: &str, size: u64) -> Result<FileEntry> {
        let path = normalize_path(path)?;
        if size > self.max_file_size {
            return Err(DfsError::FileTooLarge {
                size,
                limit: self.max_file_size,
            });
        }
        if self.namespace.read().await.exists(&path)? {
            return Err(DfsError::AlreadyExists(path));
        }

        let blocks = self.allocate_blocks(size).await?;
        let entry = FileEntry {
            filename: path.clone(),
            size,
            blocks,
        };

        // The path may have been taken while placement was running;
        // insert_file re-checks under the write lock.
        self.mutate(|namespace| namespace.insert_file(entry.clone()))
            .await?;

        tracing::info!(
            "Created file {} ({} bytes, {} blocks)",
            path,
            size,
            entry.blocks.len()
        );
        Ok(entry)
    }

    /// One placement decision per block, made in block order.
    pub async fn allocate_blocks(&self, size: u64) -> Result<Vec<BlockAssignment>> {
        let count = block_count(size, self.block_size);
        let mut blocks = Vec::new();

        for index in 0..count {
            let block_id = BlockId::new();
            let replicas = self
                .placement
                .select_replicas(self.replication_factor)
                .await?;
            let assignment = BlockAssignment::from_replicas(block_id, replicas).ok_or(
                DfsError::InsufficientReplicas {
                    needed: self.replication_factor,
                    available: 0,
                },
            )?;

            tracing::debug!(
                "Block {} ({}/{}) -> leader {} followers {:?}",
                assignment.block_id,
                index + 1,
                count,
                assignment.leader.node_id,
                assignment
                    .followers
                    .iter()
                    .map(|f| f.node_id.as_str())
                    .collect::<Vec<_>>()
            );
            blocks.push(assignment);
        }

        Ok(blocks)
    }

    pub async fn create_directory(&self, path: &str) -> Result<String> {
        let path = self
            .mutate(|namespace| namespace.ensure_directory(path))
            .await?;
        tracing::info!("Created directory {}", path);
        Ok(path)
    }

    /// Removes a directory subtree together with the file records under it.
    pub async fn delete_directory(&self, path: &str) -> Result<Vec<String>> {
        let removed = self
            .mutate(|namespace| namespace.remove_directory(path))
            .await?;
        tracing::info!(
            "Deleted directory {} ({} file records removed)",
            path,
            removed.len()
        );
        Ok(removed)
    }

    /// Removes a file record. Block bytes stay on the datanodes.
    pub async fn delete_file(&self, path: &str) -> Result<FileEntry> {
        let entry = self.mutate(|namespace| namespace.remove_file(path)).await?;
        tracing::info!("Deleted file {}", entry.filename);
        Ok(entry)
    }

    pub async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>> {
        self.namespace.read().await.list_directory(path)
    }

    /// The subtree below `path` rendered for `GET /ls`.
    pub async fn listing(&self, path: &str) -> Result<serde_json::Value> {
        Ok(self.namespace.read().await.directory(path)?.to_listing())
    }

    pub async fn lookup_file(&self, path: &str) -> Result<FileEntry> {
        self.namespace.read().await.lookup_file(path).cloned()
    }

    /// A copy of the current namespace.
    pub async fn snapshot(&self) -> Namespace {
        self.namespace.read().await.clone()
    }

    async fn mutate<T, F>(&self, apply: F) -> Result<T>
    where
        F: FnOnce(&mut Namespace) -> Result<T>,
    {
        let mut live = self.namespace.write().await;
        let mut staged = live.clone();
        let output = apply(&mut staged)?;

        self.snapshots.save(&staged).await?;
        *live = staged;
        Ok(output)
    }
}
