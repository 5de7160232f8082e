use axum::{
    Json, Router,
    body::Body,
    extract::{Extension, Path},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use super::protocol::{PutBlockResponse, frames_from_body};
use super::service::DataNode;
use crate::cluster::types::NodeMetrics;
use crate::error::{DfsError, Result};
use crate::namenode::types::BlockId;

/// The datanode's HTTP surface.
pub fn router(datanode: Arc<DataNode>) -> Router {
    Router::new()
        .route("/blocks", post(handle_put_block))
        .route("/blocks/:block_id", get(handle_get_block))
        .route("/internal/replicate", post(handle_replicate))
        .route("/metrics", get(handle_metrics))
        .layer(Extension(datanode))
}

pub async fn handle_put_block(
    Extension(datanode): Extension<Arc<DataNode>>,
    body: Body,
) -> (StatusCode, Json<PutBlockResponse>) {
    match datanode.put_block(frames_from_body(body)).await {
        Ok((block_id, replication)) => {
            let message = match &replication {
                Some(report) => format!(
                    "Block {} stored, replicated to {}/{} followers",
                    block_id,
                    report.replicated_to.len(),
                    report.followers_total()
                ),
                None => format!("Block {} stored", block_id),
            };
            (
                StatusCode::OK,
                Json(PutBlockResponse {
                    success: true,
                    message,
                    replication,
                }),
            )
        }
        Err(e) => rejected(e),
    }
}

pub async fn handle_replicate(
    Extension(datanode): Extension<Arc<DataNode>>,
    body: Body,
) -> (StatusCode, Json<PutBlockResponse>) {
    match datanode.accept_replica(frames_from_body(body)).await {
        Ok(block_id) => (
            StatusCode::OK,
            Json(PutBlockResponse {
                success: true,
                message: format!("Replica of block {} stored", block_id),
                replication: None,
            }),
        ),
        Err(e) => rejected(e),
    }
}

fn rejected(error: DfsError) -> (StatusCode, Json<PutBlockResponse>) {
    tracing::error!("Failed to store block: {}", error);
    (
        error.status_code(),
        Json(PutBlockResponse {
            success: false,
            message: error.to_string(),
            replication: None,
        }),
    )
}

pub async fn handle_get_block(
    Extension(datanode): Extension<Arc<DataNode>>,
    Path(block_id): Path<String>,
) -> Result<Response> {
    let block_id = BlockId(block_id);
    let (file, size) = datanode.open_block(&block_id).await?;
    tracing::debug!("Serving block {} ({} bytes)", block_id, size);

    let body = Body::from_stream(ReaderStream::with_capacity(file, datanode.chunk_size()));
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, size.to_string()),
        ],
        body,
    )
        .into_response())
}

pub async fn handle_metrics(Extension(datanode): Extension<Arc<DataNode>>) -> Json<NodeMetrics> {
    Json(datanode.metrics().await)
}
