//! Datanode (Storage Node) Module
//!
//! Stores block bytes on local disk and replicates them leader -> followers.
//!
//! ## Core Concepts
//! - **Framing**: Block writes arrive as a stream of length-delimited `BlockFrame`s; the first
//!   frame carrying an id fixes the block id and the ordered replica list.
//! - **Leadership**: A node that finds itself at index 0 of the replica list is the leader. It
//!   commits locally, then streams the stored block to every follower in order.
//! - **Best Effort**: Follower failures are logged and reported in a `ReplicationReport`;
//!   they never fail a write that the leader has committed.
//! - **Metrics**: `GET /metrics` reports CPU load, free disk space and a latency sample for
//!   the namenode's placement engine.

pub mod handlers;
pub mod metrics;
pub mod protocol;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;
