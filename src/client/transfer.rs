use futures::{StreamExt, stream};
use serde::de::DeserializeOwned;
use std::io::SeekFrom;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::cluster::types::NodeDescriptor;
use crate::config::{ClusterConfig, TransferConfig};
use crate::datanode::protocol::{
    BlockFrame, ENDPOINT_BLOCKS, PutBlockResponse, ReplicationReport, frames_body,
};
use crate::error::{DfsError, ErrorResponse, Result};
use crate::namenode::namespace::path_segments;
use crate::namenode::protocol::{
    CreateFileParams, ENDPOINT_DIRECTORY, ENDPOINT_FILES, ENDPOINT_LS, ListResponse,
    MessageResponse, PathParams,
};
use crate::namenode::types::{BlockAssignment, FileEntry, block_count, block_range};

/// Result of a completed upload.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub file: FileEntry,
    /// One report per block whose leader replicated it.
    pub replication: Vec<ReplicationReport>,
}

/// Talks to the namenode for metadata and straight to datanodes for bytes.
#[derive(Clone)]
pub struct TransferClient {
    namenode_url: String,
    http: reqwest::Client,
    block_size: u64,
    chunk_size: usize,
}

impl TransferClient {
    /// `block_size` must match the namenode's: it fixes each block's byte range.
    pub fn new(
        namenode_url: impl Into<String>,
        block_size: u64,
        config: &TransferConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self {
            namenode_url: namenode_url.into().trim_end_matches('/').to_string(),
            http,
            block_size: block_size.max(1),
            chunk_size: config.chunk_size.max(1),
        })
    }

    pub fn from_config(config: &ClusterConfig) -> Result<Self> {
        Self::new(
            config.namenode_url(),
            config.replication.block_size,
            &config.transfer,
        )
    }

    pub fn namenode_url(&self) -> &str {
        &self.namenode_url
    }

    // --- Namenode calls ---

    pub async fn create_file(&self, path: &str, size: u64) -> Result<FileEntry> {
        let response = self
            .http
            .post(format!("{}{}", self.namenode_url, ENDPOINT_FILES))
            .query(&CreateFileParams {
                filename: path.to_string(),
                size,
            })
            .send()
            .await?;
        decode(response).await
    }

    pub async fn lookup_file(&self, path: &str) -> Result<FileEntry> {
        let url = format!("{}{}{}", self.namenode_url, ENDPOINT_FILES, encoded_path(path)?);
        let response = self.http.get(url).send().await?;
        decode(response).await
    }

    pub async fn delete_file(&self, path: &str) -> Result<String> {
        let response = self
            .http
            .delete(format!("{}{}", self.namenode_url, ENDPOINT_FILES))
            .query(&PathParams {
                path: path.to_string(),
            })
            .send()
            .await?;
        Ok(decode::<MessageResponse>(response).await?.message)
    }

    pub async fn create_directory(&self, path: &str) -> Result<String> {
        let response = self
            .http
            .post(format!("{}{}", self.namenode_url, ENDPOINT_DIRECTORY))
            .query(&PathParams {
                path: path.to_string(),
            })
            .send()
            .await?;
        Ok(decode::<MessageResponse>(response).await?.message)
    }

    pub async fn delete_directory(&self, path: &str) -> Result<String> {
        let response = self
            .http
            .delete(format!("{}{}", self.namenode_url, ENDPOINT_DIRECTORY))
            .query(&PathParams {
                path: path.to_string(),
            })
            .send()
            .await?;
        Ok(decode::<MessageResponse>(response).await?.message)
    }

    /// The subtree below `path`: files as `"file"`, directories as objects.
    pub async fn list(&self, path: &str) -> Result<serde_json::Value> {
        let path = encoded_path(path)?;
        let url = if path == "/" {
            format!("{}{}", self.namenode_url, ENDPOINT_LS)
        } else {
            format!("{}{}{}", self.namenode_url, ENDPOINT_LS, path)
        };
        let response = self.http.get(url).send().await?;
        Ok(decode::<ListResponse>(response).await?.contents)
    }

    // --- Data paths ---

    /// Uploads a local file: allocates it on the namenode, then streams each
    /// block's byte range to that block's leader. Any rejected block fails
    /// the whole upload; the namespace entry stays allocated.
    pub async fn write_file(&self, local_path: &Path, remote_path: &str) -> Result<WriteOutcome> {
        let size = tokio::fs::metadata(local_path).await?.len();
        let file = self.create_file(remote_path, size).await?;
        let expected = block_count(size, self.block_size);
        if expected != file.blocks.len() as u64 {
            return Err(DfsError::Config(format!(
                "namenode allocated {} blocks for {} bytes, expected {} with block size {}",
                file.blocks.len(),
                size,
                expected,
                self.block_size
            )));
        }

        let mut replication = Vec::new();
        for (index, block) in file.blocks.iter().enumerate() {
            let (start, end) = block_range(index as u64, size, self.block_size);
            tracing::debug!(
                "Uploading block {} [{}..{}) to {}",
                block.block_id,
                start,
                end,
                block.leader.node_id
            );

            if let Some(report) = self.put_block(local_path, block, start, end).await? {
                if !report.fully_replicated() {
                    tracing::warn!(
                        "Block {} replicated to {}/{} followers",
                        block.block_id,
                        report.replicated_to.len(),
                        report.followers_total()
                    );
                }
                replication.push(report);
            }
        }

        tracing::info!(
            "Uploaded {} ({} bytes, {} blocks)",
            file.filename,
            size,
            file.blocks.len()
        );
        Ok(WriteOutcome { file, replication })
    }

    async fn put_block(
        &self,
        local_path: &Path,
        block: &BlockAssignment,
        start: u64,
        end: u64,
    ) -> Result<Option<ReplicationReport>> {
        let mut source = tokio::fs::File::open(local_path).await?;
        source.seek(SeekFrom::Start(start)).await?;
        let range = source.take(end - start);

        let block_id = block.block_id.clone();
        let header = BlockFrame::header(block.block_id.clone(), block.replicas());
        let chunks = ReaderStream::with_capacity(range, self.chunk_size).map(
            move |chunk| -> Result<BlockFrame> {
                let chunk = chunk?;
                Ok(BlockFrame::data(block_id.clone(), chunk.to_vec()))
            },
        );
        let frames = stream::once(async move { Ok::<_, DfsError>(header) }).chain(chunks);

        let rejected = |reason: String| DfsError::WriteRejected {
            block_id: block.block_id.clone(),
            node: block.leader.node_id.clone(),
            reason,
        };

        let response = self
            .http
            .post(format!("{}{}", block.leader.base_url(), ENDPOINT_BLOCKS))
            .body(frames_body(frames))
            .send()
            .await
            .map_err(|e| rejected(e.to_string()))?;

        let status = response.status();
        let reply: PutBlockResponse = response
            .json()
            .await
            .map_err(|e| rejected(format!("{} ({})", status, e)))?;
        if !status.is_success() || !reply.success {
            return Err(rejected(reply.message));
        }
        Ok(reply.replication)
    }

    /// Downloads a file into `local_path`, block by block. Each block is
    /// fetched whole from the first replica that serves it, leader first.
    /// On failure the partially written local file is removed.
    pub async fn read_file(&self, remote_path: &str, local_path: &Path) -> Result<FileEntry> {
        let file = self.lookup_file(remote_path).await?;

        let written = self.download_blocks(&file, local_path).await;
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(local_path).await {
                tracing::debug!(
                    "Could not remove partial download {}: {}",
                    local_path.display(),
                    cleanup
                );
            }
            return Err(e);
        }

        tracing::info!(
            "Downloaded {} ({} blocks) to {}",
            file.filename,
            file.blocks.len(),
            local_path.display()
        );
        Ok(file)
    }

    async fn download_blocks(&self, file: &FileEntry, local_path: &Path) -> Result<()> {
        let mut output = tokio::fs::File::create(local_path).await?;
        for block in &file.blocks {
            let data = self.fetch_block(block).await?;
            output.write_all(&data).await?;
        }
        output.flush().await?;
        Ok(())
    }

    /// Tries each replica in order and returns the first complete copy.
    pub async fn fetch_block(&self, block: &BlockAssignment) -> Result<Vec<u8>> {
        for replica in block.replicas() {
            match self.fetch_from(&replica, block).await {
                Ok(data) => return Ok(data),
                Err(e) => tracing::warn!(
                    "Replica {} failed to serve block {}: {}",
                    replica.node_id,
                    block.block_id,
                    e
                ),
            }
        }
        Err(DfsError::BlockUnavailable(block.block_id.clone()))
    }

    async fn fetch_from(&self, replica: &NodeDescriptor, block: &BlockAssignment) -> Result<Vec<u8>> {
        let url = format!(
            "{}{}/{}",
            replica.base_url(),
            ENDPOINT_BLOCKS,
            block.block_id
        );
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// The normalized path with every segment percent-encoded, so names holding
/// `?`, `#` or `%` stay inside the URL path.
pub(crate) fn encoded_path(path: &str) -> Result<String> {
    let segments: Vec<String> = path_segments(path)?
        .into_iter()
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    Ok(format!("/{}", segments.join("/")))
}

/// Decodes a namenode response, turning `{"detail": ...}` bodies into
/// [`DfsError::Remote`].
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let detail = match response.json::<ErrorResponse>().await {
        Ok(body) => body.detail,
        Err(_) => status.to_string(),
    };
    Err(DfsError::Remote {
        status: status.as_u16(),
        detail,
    })
}
