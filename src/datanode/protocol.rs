//! Datanode Wire Protocol
//!
//! Block writes and leader->follower pushes travel as a streamed HTTP body made of
//! length-delimited frames, each frame a bincode-encoded [`BlockFrame`]. The first
//! frame that carries a block id fixes the id (and, for client writes, the ordered
//! replica list); the data of all frames is concatenated in arrival order.
//!
//! Block reads are plain `application/octet-stream` bodies.

use axum::body::Body;
use futures::{Stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::bytes::{Bytes, BytesMut};
use tokio_util::codec::{Encoder, FramedRead, LengthDelimitedCodec};
use tokio_util::io::StreamReader;

use crate::cluster::types::{NodeDescriptor, NodeId};
use crate::error::{DfsError, Result};
use crate::namenode::types::BlockId;

// --- API Endpoints ---

/// Client -> leader block write (`POST`), block read (`GET /blocks/{block_id}`).
pub const ENDPOINT_BLOCKS: &str = "/blocks";
/// Leader -> follower push of a stored block.
pub const ENDPOINT_REPLICATE: &str = "/internal/replicate";
/// Resource sample consumed by the namenode's placement engine.
pub const ENDPOINT_METRICS: &str = "/metrics";

/// Upper bound of one encoded frame.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

// --- Data Transfer Objects ---

/// One frame of a streamed block write.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BlockFrame {
    pub block_id: Option<BlockId>,
    pub data: Vec<u8>,
    /// Ordered replica list, leader first. Only read from the first frame.
    pub replica_nodes: Vec<NodeDescriptor>,
    /// Set on leader -> follower pushes.
    pub source_node: Option<NodeId>,
}

impl BlockFrame {
    /// Opening frame of a client write.
    pub fn header(block_id: BlockId, replica_nodes: Vec<NodeDescriptor>) -> Self {
        Self {
            block_id: Some(block_id),
            replica_nodes,
            ..Default::default()
        }
    }

    pub fn data(block_id: BlockId, data: Vec<u8>) -> Self {
        Self {
            block_id: Some(block_id),
            data,
            ..Default::default()
        }
    }

    /// Frame of a leader -> follower push.
    pub fn replica(block_id: BlockId, data: Vec<u8>, source_node: NodeId) -> Self {
        Self {
            block_id: Some(block_id),
            data,
            source_node: Some(source_node),
            ..Default::default()
        }
    }
}

/// Outcome of the leader's fan-out. The block is committed at the leader no
/// matter how many followers accepted it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplicationReport {
    pub committed_at: NodeId,
    pub replicated_to: Vec<NodeId>,
    pub failed: Vec<FollowerFailure>,
}

impl ReplicationReport {
    pub fn followers_total(&self) -> usize {
        self.replicated_to.len() + self.failed.len()
    }

    pub fn fully_replicated(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FollowerFailure {
    pub node_id: NodeId,
    pub reason: String,
}

/// Response of `POST /blocks` and `POST /internal/replicate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutBlockResponse {
    pub success: bool,
    pub message: String,
    /// Present when the receiving node was the block's leader.
    pub replication: Option<ReplicationReport>,
}

// --- Framing ---

pub fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec()
}

pub fn encode_frame(frame: &BlockFrame) -> Result<Bytes> {
    let payload = bincode::serialize(frame).map_err(|e| DfsError::Frame(e.to_string()))?;
    let mut buf = BytesMut::with_capacity(payload.len() + 4);
    frame_codec().encode(Bytes::from(payload), &mut buf)?;
    Ok(buf.freeze())
}

pub fn decode_frame(payload: &[u8]) -> Result<BlockFrame> {
    bincode::deserialize(payload).map_err(|e| DfsError::Frame(e.to_string()))
}

/// Turns a stream of frames into a request body.
pub fn frames_body<S>(frames: S) -> reqwest::Body
where
    S: Stream<Item = Result<BlockFrame>> + Send + 'static,
{
    reqwest::Body::wrap_stream(frames.map(|frame| frame.and_then(|f| encode_frame(&f))))
}

/// Decodes a streamed request body back into frames.
pub fn frames_from_body(body: Body) -> impl Stream<Item = Result<BlockFrame>> {
    let bytes = body.into_data_stream().map_err(std::io::Error::other);
    FramedRead::new(StreamReader::new(bytes), frame_codec())
        .map(|frame| -> Result<BlockFrame> { decode_frame(&frame?) })
}
