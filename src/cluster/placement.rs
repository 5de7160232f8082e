use futures::StreamExt;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use super::probe::MetricsProbe;
use super::types::{NodeDescriptor, ProbedNode};
use crate::config::PlacementConfig;
use crate::error::{DfsError, Result};

pub struct PlacementEngine {
    nodes: Vec<NodeDescriptor>,
    probe: Arc<dyn MetricsProbe>,
    probe_timeout: Duration,
    max_concurrent_probes: usize,
}

impl PlacementEngine {
    pub fn new(
        nodes: Vec<NodeDescriptor>,
        probe: Arc<dyn MetricsProbe>,
        config: &PlacementConfig,
    ) -> Self {
        Self {
            nodes,
            probe,
            probe_timeout: config.probe_timeout(),
            max_concurrent_probes: config.max_concurrent_probes.max(1),
        }
    }

    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    /// Probes every known datanode concurrently and returns the ones that
    /// answered within the probe timeout, in no particular order.
    pub async fn probe_all(&self) -> Vec<ProbedNode> {
        // Each probe future owns its node so the stream stays Send.
        let probes = self.nodes.iter().cloned().map(|node| {
            let probe = Arc::clone(&self.probe);
            let probe_timeout = self.probe_timeout;
            async move {
                let outcome = tokio::time::timeout(probe_timeout, probe.probe(&node)).await;
                (node, outcome)
            }
        });

        let results: Vec<_> = futures::stream::iter(probes)
            .buffer_unordered(self.max_concurrent_probes)
            .collect()
            .await;

        let mut candidates = Vec::with_capacity(results.len());
        for (node, outcome) in results {
            match outcome {
                Ok(Ok(metrics)) => {
                    tracing::debug!(
                        "Probed {}: load={:.1} available_space={} latency={:.2}",
                        node.node_id,
                        metrics.load,
                        metrics.available_space,
                        metrics.latency
                    );
                    candidates.push(ProbedNode { node, metrics });
                }
                Ok(Err(e)) => {
                    tracing::warn!("Error getting metrics from {}: {}", node.node_id, e);
                }
                Err(_) => {
                    tracing::warn!(
                        "Metrics probe to {} timed out after {:?}",
                        node.node_id,
                        self.probe_timeout
                    );
                }
            }
        }
        candidates
    }

    /// Picks `desired_count` datanodes for one block. The first entry is the
    /// leader, the rest are followers.
    pub async fn select_replicas(&self, desired_count: usize) -> Result<Vec<NodeDescriptor>> {
        let candidates = rank_candidates(self.probe_all().await);

        if candidates.len() < desired_count {
            tracing::warn!(
                "Placement needs {} replicas but only {} of {} datanodes responded",
                desired_count,
                candidates.len(),
                self.nodes.len()
            );
            return Err(DfsError::InsufficientReplicas {
                needed: desired_count,
                available: candidates.len(),
            });
        }

        Ok(candidates
            .into_iter()
            .take(desired_count)
            .map(|candidate| candidate.node)
            .collect())
    }
}

/// Orders candidates by ascending load, then descending free space. Node id
/// breaks any remaining tie so the order is total.
pub fn rank_candidates(mut candidates: Vec<ProbedNode>) -> Vec<ProbedNode> {
    candidates.sort_by(compare_candidates);
    candidates
}

fn compare_candidates(a: &ProbedNode, b: &ProbedNode) -> Ordering {
    a.metrics
        .load
        .total_cmp(&b.metrics.load)
        .then_with(|| b.metrics.available_space.cmp(&a.metrics.available_space))
        .then_with(|| a.node.node_id.cmp(&b.node.node_id))
}
