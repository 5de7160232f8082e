//! Namenode (Coordinator) Module
//!
//! Owns the directory namespace and decides where file blocks live.
//!
//! ## Core Concepts
//! - **Namespace**: A typed directory tree (`Directory | File`) plus a path -> `FileEntry` map.
//! - **Allocation**: `create_file` splits the size into `ceil(size / block_size)` blocks and
//!   asks the placement engine for an ordered replica list per block, leader first.
//! - **Persistence**: Every mutation rewrites the full snapshot (temp file + rename) before it
//!   is acknowledged; the snapshot is reloaded wholesale at startup.
//! - **Serialization**: Mutations are applied one at a time under a single writer lock.

pub mod handlers;
pub mod namespace;
pub mod protocol;
pub mod service;
pub mod snapshot;
pub mod types;

#[cfg(test)]
mod tests;
