//! Error types shared by the namenode, datanode and transfer client.
//!
//! Every failure that crosses an HTTP boundary is rendered as a
//! `{"detail": "<reason>"}` body together with the status code returned by
//! [`DfsError::status_code`], so callers always get a human-readable reason
//! that names the failure kind.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

use crate::cluster::types::NodeId;
use crate::namenode::types::BlockId;

pub type Result<T> = std::result::Result<T, DfsError>;

#[derive(Error, Debug)]
pub enum DfsError {
    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Block not found: {0}")]
    BlockNotFound(BlockId),

    #[error("Insufficient replicas: need {needed}, only {available} datanode(s) responded")]
    InsufficientReplicas { needed: usize, available: usize },

    #[error("No block ID provided")]
    MissingBlockId,

    #[error("Block {0} unavailable on every replica")]
    BlockUnavailable(BlockId),

    #[error("Replication to {node} failed: {reason}")]
    ReplicationFailure { node: NodeId, reason: String },

    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid block id: {0:?}")]
    InvalidBlockId(String),

    #[error("Write of block {block_id} rejected by {node}: {reason}")]
    WriteRejected {
        block_id: BlockId,
        node: NodeId,
        reason: String,
    },

    #[error("File of {size} bytes exceeds the limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Block exceeds the limit of {limit} bytes")]
    BlockTooLarge { limit: u64 },

    #[error("Malformed block frame: {0}")]
    Frame(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Coordinator request failed ({status}): {detail}")]
    Remote { status: u16, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl DfsError {
    /// Maps the error onto the status code used by the HTTP surfaces.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DfsError::AlreadyExists(_)
            | DfsError::InvalidPath { .. }
            | DfsError::InvalidBlockId(_)
            | DfsError::MissingBlockId
            | DfsError::FileTooLarge { .. }
            | DfsError::BlockTooLarge { .. }
            | DfsError::Frame(_) => StatusCode::BAD_REQUEST,
            DfsError::NotFound(_) | DfsError::BlockNotFound(_) => StatusCode::NOT_FOUND,
            DfsError::BlockUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DfsError::Remote { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error body returned by every failing HTTP handler.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl IntoResponse for DfsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        (
            status,
            Json(ErrorResponse {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}
