use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a datanode, as configured in `[datanodes.<id>]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A datanode reference as it travels in replica lists: identity plus the
/// `host:port` its HTTP surface listens on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NodeDescriptor {
    pub node_id: NodeId,
    pub address: String,
}

impl NodeDescriptor {
    pub fn new(node_id: NodeId, address: impl Into<String>) -> Self {
        Self {
            node_id,
            address: address.into(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }
}

/// Point-in-time resource sample reported by a datanode's metrics endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NodeMetrics {
    /// CPU load on a 0-100 scale.
    pub load: f64,
    /// Free bytes on the volume holding the block directory.
    pub available_space: u64,
    /// Latency sample; only compared, never interpreted.
    pub latency: f64,
}

/// A datanode that answered its probe, with the sample it returned.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbedNode {
    pub node: NodeDescriptor,
    pub metrics: NodeMetrics,
}
