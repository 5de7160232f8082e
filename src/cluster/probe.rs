use async_trait::async_trait;

use super::types::{NodeDescriptor, NodeMetrics};
use crate::datanode::protocol::ENDPOINT_METRICS;
use crate::error::{DfsError, Result};

/// Fetches a resource sample from one datanode.
#[async_trait]
pub trait MetricsProbe: Send + Sync {
    async fn probe(&self, node: &NodeDescriptor) -> Result<NodeMetrics>;
}

/// Probes datanodes through their `GET /metrics` endpoint.
#[derive(Debug, Clone, Default)]
pub struct HttpMetricsProbe {
    http_client: reqwest::Client,
}

impl HttpMetricsProbe {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl MetricsProbe for HttpMetricsProbe {
    async fn probe(&self, node: &NodeDescriptor) -> Result<NodeMetrics> {
        let url = format!("{}{}", node.base_url(), ENDPOINT_METRICS);
        let response = self.http_client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(DfsError::Remote {
                status: response.status().as_u16(),
                detail: format!("metrics request to {} failed", node.node_id),
            });
        }

        Ok(response.json::<NodeMetrics>().await?)
    }
}
