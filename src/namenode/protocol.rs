//! Namenode HTTP API
//!
//! Endpoints and Data Transfer Objects used by the transfer client and the CLI.
//! Successful responses carry the payloads below; failures carry an
//! `ErrorResponse` (`{"detail": ...}`).

use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// `POST` allocates a file, `DELETE` removes one, `GET /files/{path}` looks one up.
pub const ENDPOINT_FILES: &str = "/files";
/// `POST` creates a directory chain, `DELETE` removes a subtree.
pub const ENDPOINT_DIRECTORY: &str = "/directory";
/// `GET /ls/{path}` renders a directory subtree.
pub const ENDPOINT_LS: &str = "/ls";

// --- Data Transfer Objects ---

/// Query of `POST /files`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateFileParams {
    pub filename: String,
    pub size: u64,
}

/// Query of the path-addressed `DELETE` and `POST /directory` calls.
#[derive(Debug, Serialize, Deserialize)]
pub struct PathParams {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Body of `GET /ls`: files render as `"file"`, directories as nested objects.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub contents: serde_json::Value,
}
