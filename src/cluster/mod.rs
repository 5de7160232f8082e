//! Cluster Placement Module
//!
//! Decides which datanodes hold each block.
//!
//! ## Core Concepts
//! - **Descriptors**: The datanode set is static and comes from the cluster config.
//! - **Probing**: `MetricsProbe` fetches load, free space and a latency sample from a
//!   datanode. Every placement decision re-probes all nodes in parallel; nothing is cached.
//! - **Ranking**: `PlacementEngine` orders respondents by ascending load, then by
//!   descending free space, and hands out the top `n` as an ordered replica list
//!   (index 0 is the block's leader).

pub mod placement;
pub mod probe;
pub mod types;
