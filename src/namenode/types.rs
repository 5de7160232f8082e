use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cluster::types::NodeDescriptor;

/// Globally unique identifier of a block, generated at allocation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub String);

impl BlockId {
    /// Generates a new random UUID v4-based BlockId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Placement of one block: the leader receives the client's write and pushes
/// it to the followers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockAssignment {
    pub block_id: BlockId,
    pub leader: NodeDescriptor,
    pub followers: Vec<NodeDescriptor>,
}

impl BlockAssignment {
    /// Builds an assignment from an ordered replica list. Returns `None` for an
    /// empty list.
    pub fn from_replicas(block_id: BlockId, replicas: Vec<NodeDescriptor>) -> Option<Self> {
        let mut replicas = replicas.into_iter();
        let leader = replicas.next()?;
        Some(Self {
            block_id,
            leader,
            followers: replicas.collect(),
        })
    }

    /// The full ordered replica list, leader first.
    pub fn replicas(&self) -> Vec<NodeDescriptor> {
        std::iter::once(self.leader.clone())
            .chain(self.followers.iter().cloned())
            .collect()
    }
}

/// Metadata of one file. `size` is advisory; it is never checked against the
/// bytes actually written to the datanodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileEntry {
    pub filename: String,
    pub size: u64,
    pub blocks: Vec<BlockAssignment>,
}

impl FileEntry {
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks.iter().map(|b| b.block_id.clone()).collect()
    }
}

/// Number of `block_size` blocks needed to hold `size` bytes.
pub fn block_count(size: u64, block_size: u64) -> u64 {
    size.div_ceil(block_size)
}

/// Byte range `[start, end)` of block `index` in a file of `size` bytes.
pub fn block_range(index: u64, size: u64, block_size: u64) -> (u64, u64) {
    let start = index.saturating_mul(block_size).min(size);
    let end = start.saturating_add(block_size).min(size);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::types::NodeId;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_block_count_is_ceiling() {
        assert_eq!(block_count(0, 64 * MB), 0);
        assert_eq!(block_count(1, 64 * MB), 1);
        assert_eq!(block_count(64 * MB, 64 * MB), 1);
        assert_eq!(block_count(64 * MB + 1, 64 * MB), 2);
        assert_eq!(block_count(150 * MB, 64 * MB), 3);

        for size in 0..200u64 {
            for block_size in 1..20u64 {
                let expected = (size as f64 / block_size as f64).ceil() as u64;
                assert_eq!(block_count(size, block_size), expected);
            }
        }
    }

    #[test]
    fn test_block_ranges_cover_the_file() {
        let size = 150 * MB;
        let ranges: Vec<_> = (0..block_count(size, 64 * MB))
            .map(|i| block_range(i, size, 64 * MB))
            .collect();

        assert_eq!(ranges, vec![(0, 64 * MB), (64 * MB, 128 * MB), (128 * MB, 150 * MB)]);
    }

    #[test]
    fn test_assignment_keeps_leader_first() {
        let replicas = vec![
            NodeDescriptor::new(NodeId::from("b"), "b:1"),
            NodeDescriptor::new(NodeId::from("a"), "a:1"),
        ];
        let assignment = BlockAssignment::from_replicas(BlockId::new(), replicas.clone()).unwrap();

        assert_eq!(assignment.leader.node_id.as_str(), "b");
        assert_eq!(assignment.followers.len(), 1);
        assert_eq!(assignment.replicas(), replicas);
        assert!(BlockAssignment::from_replicas(BlockId::new(), vec![]).is_none());
    }

    #[test]
    fn test_block_ids_are_unique() {
        assert_ne!(BlockId::new(), BlockId::new());
    }
}
