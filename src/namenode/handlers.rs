use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    routing::{get, post},
};
use std::sync::Arc;

use super::protocol::{CreateFileParams, ListResponse, MessageResponse, PathParams};
use super::service::NameNode;
use super::types::FileEntry;
use crate::error::Result;

/// The namenode's HTTP surface.
pub fn router(namenode: Arc<NameNode>) -> Router {
    Router::new()
        .route("/files", post(handle_create_file).delete(handle_delete_file))
        .route("/files/*path", get(handle_get_file))
        .route(
            "/directory",
            post(handle_create_directory).delete(handle_delete_directory),
        )
        .route("/ls", get(handle_list_root))
        .route("/ls/*path", get(handle_list_directory))
        .layer(Extension(namenode))
}

pub async fn handle_create_file(
    Extension(namenode): Extension<Arc<NameNode>>,
    Query(params): Query<CreateFileParams>,
) -> Result<Json<FileEntry>> {
    let entry = namenode.create_file(&params.filename, params.size).await?;
    Ok(Json(entry))
}

pub async fn handle_get_file(
    Extension(namenode): Extension<Arc<NameNode>>,
    Path(path): Path<String>,
) -> Result<Json<FileEntry>> {
    let entry = namenode.lookup_file(&path).await?;
    Ok(Json(entry))
}

pub async fn handle_delete_file(
    Extension(namenode): Extension<Arc<NameNode>>,
    Query(params): Query<PathParams>,
) -> Result<Json<MessageResponse>> {
    let entry = namenode.delete_file(&params.path).await?;
    Ok(Json(MessageResponse {
        message: format!("File {} deleted", entry.filename),
    }))
}

pub async fn handle_create_directory(
    Extension(namenode): Extension<Arc<NameNode>>,
    Query(params): Query<PathParams>,
) -> Result<Json<MessageResponse>> {
    let path = namenode.create_directory(&params.path).await?;
    Ok(Json(MessageResponse {
        message: format!("Directory {} created", path),
    }))
}

pub async fn handle_delete_directory(
    Extension(namenode): Extension<Arc<NameNode>>,
    Query(params): Query<PathParams>,
) -> Result<Json<MessageResponse>> {
    let removed = namenode.delete_directory(&params.path).await?;
    Ok(Json(MessageResponse {
        message: format!(
            "Directory {} deleted ({} files removed)",
            params.path,
            removed.len()
        ),
    }))
}

pub async fn handle_list_root(
    Extension(namenode): Extension<Arc<NameNode>>,
) -> Result<Json<ListResponse>> {
    let contents = namenode.listing("/").await?;
    Ok(Json(ListResponse { contents }))
}

pub async fn handle_list_directory(
    Extension(namenode): Extension<Arc<NameNode>>,
    Path(path): Path<String>,
) -> Result<Json<ListResponse>> {
    let contents = namenode.listing(&path).await?;
    Ok(Json(ListResponse { contents }))
}
