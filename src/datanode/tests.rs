//! Datanode Module Tests
//!
//! Runs real datanode HTTP servers on ephemeral ports.
//!
//! ## Test Scopes
//! - **Writes**: Frame reassembly, id validation, missing ids.
//! - **Replication**: Leader fan-out, follower failures, non-leader receipt.
//! - **Reads & Metrics**: Block streaming and the metrics endpoint.

#[cfg(test)]
mod tests {
    use crate::cluster::types::{NodeDescriptor, NodeId, NodeMetrics};
    use crate::config::TransferConfig;
    use crate::datanode::handlers::router;
    use crate::datanode::protocol::{BlockFrame, PutBlockResponse, frames_body};
    use crate::datanode::service::DataNode;
    use crate::namenode::types::BlockId;
    use futures::stream;
    use reqwest::StatusCode;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    struct RunningNode {
        datanode: Arc<DataNode>,
        descriptor: NodeDescriptor,
        _storage: TempDir,
    }

    const MAX_BLOCK_SIZE: u64 = 64 * 1024;

    async fn spawn_datanode(id: &str) -> RunningNode {
        spawn_datanode_with_limit(id, MAX_BLOCK_SIZE).await
    }

    async fn spawn_datanode_with_limit(id: &str, max_block_size: u64) -> RunningNode {
        let storage = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = TransferConfig {
            chunk_size: 1024,
            ..TransferConfig::default()
        };

        let datanode = DataNode::open(NodeId::from(id), storage.path(), max_block_size, &config)
            .await
            .unwrap();
        let app = router(datanode.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        RunningNode {
            datanode,
            descriptor: NodeDescriptor::new(NodeId::from(id), addr.to_string()),
            _storage: storage,
        }
    }

    /// An address nothing listens on.
    async fn dead_node(id: &str) -> NodeDescriptor {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        NodeDescriptor::new(NodeId::from(id), addr.to_string())
    }

    async fn put_frames(
        target: &NodeDescriptor,
        frames: Vec<BlockFrame>,
    ) -> (StatusCode, PutBlockResponse) {
        let body = frames_body(stream::iter(frames.into_iter().map(Ok)));
        let response = reqwest::Client::new()
            .post(format!("{}/blocks", target.base_url()))
            .body(body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    fn block_frames(id: &BlockId, replicas: Vec<NodeDescriptor>, data: &[u8]) -> Vec<BlockFrame> {
        let mut frames = vec![BlockFrame::header(id.clone(), replicas)];
        frames.extend(
            data.chunks(1000)
                .map(|chunk| BlockFrame::data(id.clone(), chunk.to_vec())),
        );
        frames
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    // ============================================================
    // WRITES
    // ============================================================

    #[tokio::test]
    async fn test_put_then_get_returns_identical_bytes() {
        let node = spawn_datanode("dn1").await;
        let id = BlockId::new();
        let data = payload(10_500);

        let (status, response) =
            put_frames(&node.descriptor, block_frames(&id, vec![], &data)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(response.success);
        assert!(response.replication.is_none());

        let fetched = reqwest::get(format!("{}/blocks/{}", node.descriptor.base_url(), id))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(fetched.as_ref(), data.as_slice());
    }

    #[tokio::test]
    async fn test_stream_without_block_id_is_rejected() {
        let node = spawn_datanode("dn1").await;
        let frames = vec![BlockFrame {
            data: vec![1, 2, 3],
            ..Default::default()
        }];

        let (status, response) = put_frames(&node.descriptor, frames).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!response.success);
        assert_eq!(response.message, "No block ID provided");
        assert_eq!(node.datanode.store().block_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_stream_is_rejected() {
        let node = spawn_datanode("dn1").await;

        let (status, response) = put_frames(&node.descriptor, vec![]).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!response.success);
    }

    #[tokio::test]
    async fn test_path_like_block_id_is_rejected() {
        let node = spawn_datanode("dn1").await;
        let id = BlockId("../escape".to_string());

        let (status, response) =
            put_frames(&node.descriptor, block_frames(&id, vec![], b"x")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!response.success);
    }

    #[tokio::test]
    async fn test_data_before_the_id_frame_is_kept() {
        let node = spawn_datanode("dn1").await;
        let id = BlockId::new();
        let frames = vec![
            BlockFrame {
                data: b"head-".to_vec(),
                ..Default::default()
            },
            BlockFrame::data(id.clone(), b"tail".to_vec()),
        ];

        let (status, _) = put_frames(&node.descriptor, frames).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(node.datanode.store().read(&id).await.unwrap(), b"head-tail");
    }

    #[tokio::test]
    async fn test_block_over_the_size_limit_is_rejected() {
        let node = spawn_datanode_with_limit("dn1", 4_096).await;
        let id = BlockId::new();

        let (status, response) =
            put_frames(&node.descriptor, block_frames(&id, vec![], &payload(5_000))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!response.success);
        assert!(response.message.contains("4096"));
        assert!(!node.datanode.store().contains(&id));
        assert_eq!(node.datanode.store().block_count(), 0);
    }

    #[tokio::test]
    async fn test_block_at_the_size_limit_is_stored() {
        let node = spawn_datanode_with_limit("dn1", 4_096).await;
        let id = BlockId::new();
        let data = payload(4_096);

        let (status, _) = put_frames(&node.descriptor, block_frames(&id, vec![], &data)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(node.datanode.store().read(&id).await.unwrap(), data);
    }

    // ============================================================
    // REPLICATION
    // ============================================================

    #[tokio::test]
    async fn test_leader_replicates_to_every_follower() {
        let leader = spawn_datanode("dn1").await;
        let follower_a = spawn_datanode("dn2").await;
        let follower_b = spawn_datanode("dn3").await;
        let id = BlockId::new();
        let data = payload(5_000);
        let replicas = vec![
            leader.descriptor.clone(),
            follower_a.descriptor.clone(),
            follower_b.descriptor.clone(),
        ];

        let (status, response) =
            put_frames(&leader.descriptor, block_frames(&id, replicas, &data)).await;

        assert_eq!(status, StatusCode::OK);
        let report = response.replication.unwrap();
        assert_eq!(report.committed_at, NodeId::from("dn1"));
        assert_eq!(
            report.replicated_to,
            vec![NodeId::from("dn2"), NodeId::from("dn3")]
        );
        assert!(report.fully_replicated());
        for node in [&leader, &follower_a, &follower_b] {
            assert_eq!(node.datanode.store().read(&id).await.unwrap(), data);
        }
    }

    #[tokio::test]
    async fn test_unreachable_follower_does_not_fail_the_write() {
        let leader = spawn_datanode("dn1").await;
        let live = spawn_datanode("dn3").await;
        let dead = dead_node("dn2").await;
        let id = BlockId::new();
        let replicas = vec![
            leader.descriptor.clone(),
            dead.clone(),
            live.descriptor.clone(),
        ];

        let (status, response) =
            put_frames(&leader.descriptor, block_frames(&id, replicas, b"payload")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(response.success);
        let report = response.replication.unwrap();
        assert_eq!(report.replicated_to, vec![NodeId::from("dn3")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].node_id, NodeId::from("dn2"));
        assert!(leader.datanode.store().contains(&id));
        assert!(live.datanode.store().contains(&id));
    }

    #[tokio::test]
    async fn test_non_leader_stores_without_forwarding() {
        let receiver = spawn_datanode("dn2").await;
        let other = spawn_datanode("dn3").await;
        let id = BlockId::new();
        let replicas = vec![other.descriptor.clone(), receiver.descriptor.clone()];

        let (status, response) =
            put_frames(&receiver.descriptor, block_frames(&id, replicas, b"abc")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(response.replication.is_none());
        assert!(receiver.datanode.store().contains(&id));
        assert!(!other.datanode.store().contains(&id));
    }

    // ============================================================
    // READS & METRICS
    // ============================================================

    #[tokio::test]
    async fn test_get_unknown_block_is_not_found() {
        let node = spawn_datanode("dn1").await;

        let response = reqwest::get(format!(
            "{}/blocks/{}",
            node.descriptor.base_url(),
            BlockId::new()
        ))
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_of_unindexed_file_is_not_found() {
        let node = spawn_datanode("dn1").await;
        let id = BlockId::new();
        std::fs::write(node.datanode.store().block_path(&id).unwrap(), b"stray").unwrap();

        let response = reqwest::get(format!("{}/blocks/{}", node.descriptor.base_url(), id))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_reports_a_sample() {
        let node = spawn_datanode("dn1").await;

        let metrics: NodeMetrics = reqwest::get(format!("{}/metrics", node.descriptor.base_url()))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert!((0.0..=100.0).contains(&metrics.load));
        assert!(metrics.available_space > 0);
    }
}
