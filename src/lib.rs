//! Distributed Block File Store Library
//!
//! This library crate defines the core modules of the file store. It is the
//! foundation for the `dfs` server binary (`main.rs`) and the `dfs-cli` shell.
//!
//! ## Architecture Modules
//!
//! - **`namenode`**: The coordinator. Owns the directory namespace and file -> block
//!   mappings, persists them as a JSON snapshot, and allocates blocks to datanodes.
//! - **`cluster`**: Placement. Probes every datanode's metrics in parallel and ranks the
//!   respondents into an ordered replica list (leader first).
//! - **`datanode`**: Storage nodes. Receive streamed block writes, store them on disk and,
//!   as leader, push each block to its followers.
//! - **`client`**: The transfer client. Splits local files into blocks on upload and
//!   reassembles them on download, falling back across replicas.
//! - **`config`** / **`error`**: Cluster configuration (TOML) and the shared error type.

pub mod client;
pub mod cluster;
pub mod config;
pub mod datanode;
pub mod error;
pub mod namenode;
