//! Transfer Client Module
//!
//! Moves file bytes between a local filesystem and the datanodes, using the
//! namenode only for metadata.
//!
//! ## Core Concepts
//! - **Write Path**: Allocate the file, then stream each block's byte range to its leader
//!   together with the ordered replica list; the leader handles replication.
//! - **Read Path**: Look the file up, then fetch each block from the leader, falling back to
//!   the followers in order. Only complete blocks are written to the output.
//! - **Namespace Calls**: Thin wrappers over the namenode API (`mkdir`, `ls`, `rm`, ...) that
//!   turn `{"detail": ...}` error bodies into `DfsError::Remote`.

pub mod transfer;

pub use transfer::{TransferClient, WriteOutcome};
