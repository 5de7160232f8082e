use futures::{Stream, StreamExt, stream};
use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::ReaderStream;

use super::metrics::MetricsSampler;
use super::protocol::{
    BlockFrame, ENDPOINT_REPLICATE, FollowerFailure, PutBlockResponse, ReplicationReport,
    frames_body,
};
use super::store::{BlockStore, validate_block_id};
use crate::cluster::types::{NodeDescriptor, NodeId, NodeMetrics};
use crate::config::TransferConfig;
use crate::error::{DfsError, Result};
use crate::namenode::types::BlockId;

/// A block reassembled from its frames.
#[derive(Debug)]
pub struct ReceivedBlock {
    pub block_id: BlockId,
    pub data: Vec<u8>,
    pub replica_nodes: Vec<NodeDescriptor>,
    pub source_node: Option<NodeId>,
}

/// A storage node. It keeps blocks on local disk and, when it is the first
/// entry of a block's replica list, pushes the stored block to the rest.
pub struct DataNode {
    node_id: NodeId,
    store: BlockStore,
    sampler: MetricsSampler,
    http_client: reqwest::Client,
    chunk_size: usize,
    replication_timeout: Duration,
    max_block_size: u64,
}

impl DataNode {
    pub fn new(
        node_id: NodeId,
        store: BlockStore,
        http_client: reqwest::Client,
        max_block_size: u64,
        config: &TransferConfig,
    ) -> Self {
        let sampler = MetricsSampler::new(store.root());
        Self {
            node_id,
            store,
            sampler,
            http_client,
            chunk_size: config.chunk_size.max(1),
            replication_timeout: config.replication_timeout(),
            max_block_size,
        }
    }

    /// `max_block_size` bounds every received block; it is the cluster's
    /// block size.
    pub async fn open(
        node_id: NodeId,
        storage_path: impl Into<PathBuf>,
        max_block_size: u64,
        config: &TransferConfig,
    ) -> Result<Arc<Self>> {
        let store = BlockStore::open(storage_path).await?;
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Arc::new(Self::new(
            node_id,
            store,
            http_client,
            max_block_size,
            config,
        )))
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn max_block_size(&self) -> u64 {
        self.max_block_size
    }

    pub async fn metrics(&self) -> NodeMetrics {
        self.sampler.sample().await
    }

    /// Handles a client write: stores the block and, if this node leads it,
    /// replicates it. The report is `None` when this node is a follower in
    /// the received replica list (or the list is empty).
    pub async fn put_block<S>(&self, frames: S) -> Result<(BlockId, Option<ReplicationReport>)>
    where
        S: Stream<Item = Result<BlockFrame>>,
    {
        let block = assemble_block(frames, self.max_block_size).await?;
        self.store.write(&block.block_id, &block.data).await?;
        tracing::info!(
            "[{}] Stored block {} ({} bytes)",
            self.node_id,
            block.block_id,
            block.data.len()
        );

        let leads = block
            .replica_nodes
            .first()
            .is_some_and(|leader| leader.node_id == self.node_id);
        if !leads {
            return Ok((block.block_id, None));
        }

        let report = self
            .replicate_to_followers(&block.block_id, &block.replica_nodes[1..])
            .await;
        Ok((block.block_id, Some(report)))
    }

    /// Handles a leader's push: stores the block, never forwards it.
    pub async fn accept_replica<S>(&self, frames: S) -> Result<BlockId>
    where
        S: Stream<Item = Result<BlockFrame>>,
    {
        let block = assemble_block(frames, self.max_block_size).await?;
        self.store.write(&block.block_id, &block.data).await?;
        tracing::info!(
            "[{}] Stored replica of block {} from {} ({} bytes)",
            self.node_id,
            block.block_id,
            block
                .source_node
                .as_ref()
                .map(NodeId::as_str)
                .unwrap_or("unknown"),
            block.data.len()
        );
        Ok(block.block_id)
    }

    /// Pushes a stored block to each follower in order. Failures are logged
    /// and reported, never raised: the block is already committed here.
    pub async fn replicate_to_followers(
        &self,
        block_id: &BlockId,
        followers: &[NodeDescriptor],
    ) -> ReplicationReport {
        let mut report = ReplicationReport {
            committed_at: self.node_id.clone(),
            replicated_to: Vec::new(),
            failed: Vec::new(),
        };

        for follower in followers {
            if follower.node_id == self.node_id {
                continue;
            }
            match self.push_replica(block_id, follower).await {
                Ok(()) => {
                    tracing::info!(
                        "[{}] Replicated block {} to {}",
                        self.node_id,
                        block_id,
                        follower.node_id
                    );
                    report.replicated_to.push(follower.node_id.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        "[{}] Error replicating block {} to {}: {}",
                        self.node_id,
                        block_id,
                        follower.node_id,
                        e
                    );
                    report.failed.push(FollowerFailure {
                        node_id: follower.node_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Streams the stored block to one follower in `chunk_size` frames.
    async fn push_replica(&self, block_id: &BlockId, follower: &NodeDescriptor) -> Result<()> {
        let file = self.store.open_block(block_id).await?;
        let id = block_id.clone();
        let source = self.node_id.clone();

        let header = BlockFrame::replica(block_id.clone(), Vec::new(), source.clone());
        let chunks = ReaderStream::with_capacity(file, self.chunk_size).map(
            move |chunk| -> Result<BlockFrame> {
                let chunk = chunk?;
                Ok(BlockFrame::replica(id.clone(), chunk.to_vec(), source.clone()))
            },
        );
        let frames = stream::once(async move { Ok::<_, DfsError>(header) }).chain(chunks);

        let url = format!("{}{}", follower.base_url(), ENDPOINT_REPLICATE);
        let response = self
            .http_client
            .post(&url)
            .timeout(self.replication_timeout)
            .body(frames_body(frames))
            .send()
            .await
            .map_err(|e| DfsError::ReplicationFailure {
                node: follower.node_id.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let reason = match response.json::<PutBlockResponse>().await {
            Ok(body) => body.message,
            Err(_) => status.to_string(),
        };
        Err(DfsError::ReplicationFailure {
            node: follower.node_id.clone(),
            reason,
        })
    }

    /// Opens a held block for streaming, with its size.
    pub async fn open_block(&self, block_id: &BlockId) -> Result<(tokio::fs::File, u64)> {
        let file = self.store.open_block(block_id).await?;
        let size = file.metadata().await?.len();
        Ok((file, size))
    }
}

/// Concatenates the frames of one block. The first frame carrying a block id
/// fixes the id, the replica list and the source; later frames may repeat the
/// id but must not name another block. A stream whose data grows past
/// `max_block_size` is rejected as soon as the limit is crossed.
pub async fn assemble_block<S>(frames: S, max_block_size: u64) -> Result<ReceivedBlock>
where
    S: Stream<Item = Result<BlockFrame>>,
{
    let mut frames = pin!(frames);
    let mut block: Option<ReceivedBlock> = None;
    let mut pending = Vec::new();
    let mut received: u64 = 0;

    while let Some(frame) = frames.next().await {
        let frame = frame?;
        received += frame.data.len() as u64;
        if received > max_block_size {
            return Err(DfsError::BlockTooLarge {
                limit: max_block_size,
            });
        }

        if let Some(current) = block.as_mut() {
            if let Some(other) = &frame.block_id
                && *other != current.block_id
            {
                return Err(DfsError::Frame(format!(
                    "frame for block {} in the stream of block {}",
                    other, current.block_id
                )));
            }
            current.data.extend_from_slice(&frame.data);
            continue;
        }

        pending.extend_from_slice(&frame.data);
        if let Some(block_id) = frame.block_id {
            validate_block_id(&block_id)?;
            block = Some(ReceivedBlock {
                block_id,
                data: std::mem::take(&mut pending),
                replica_nodes: frame.replica_nodes,
                source_node: frame.source_node,
            });
        }
    }

    block.ok_or(DfsError::MissingBlockId)
}
