//! Namenode Module Tests
//!
//! Exercises the coordinator against a fixed metrics probe and a throwaway
//! snapshot directory.
//!
//! ## Test Scopes
//! - **Files**: Block allocation, duplicates, placement failures, removal.
//! - **Directories**: Creation, listing, cascading removal.
//! - **Persistence**: Restart reproduces the namespace; corrupt snapshots.

#[cfg(test)]
mod tests {
    use crate::cluster::placement::PlacementEngine;
    use crate::cluster::probe::MetricsProbe;
    use crate::cluster::types::{NodeDescriptor, NodeId, NodeMetrics};
    use crate::config::PlacementConfig;
    use crate::error::{DfsError, Result};
    use crate::namenode::namespace::{DirEntry, EntryKind, Namespace};
    use crate::namenode::service::NameNode;
    use crate::namenode::snapshot::SnapshotStore;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Arc;

    const MB: u64 = 1024 * 1024;

    /// Every node answers with the same sample.
    struct FixedProbe;

    #[async_trait]
    impl MetricsProbe for FixedProbe {
        async fn probe(&self, _node: &NodeDescriptor) -> Result<NodeMetrics> {
            Ok(NodeMetrics {
                load: 10.0,
                available_space: 100 * MB,
                latency: 0.2,
            })
        }
    }

    fn datanodes(count: usize) -> Vec<NodeDescriptor> {
        (0..count)
            .map(|i| {
                NodeDescriptor::new(
                    NodeId(format!("datanode{}", i + 1)),
                    format!("127.0.0.1:{}", 50051 + i),
                )
            })
            .collect()
    }

    async fn namenode_with(dir: &Path, datanode_count: usize) -> NameNode {
        let snapshots = SnapshotStore::new(dir.join("namenode_state.json"));
        let namespace = snapshots.load(false).await.unwrap();
        let placement = PlacementEngine::new(
            datanodes(datanode_count),
            Arc::new(FixedProbe),
            &PlacementConfig::default(),
        );
        NameNode::new(namespace, placement, snapshots, 64 * MB, 2)
    }

    // ============================================================
    // FILES
    // ============================================================

    #[tokio::test]
    async fn test_create_file_allocates_one_assignment_per_block() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = namenode_with(dir.path(), 3).await;

        let entry = namenode.create_file("/data/big.bin", 150 * MB).await.unwrap();

        assert_eq!(entry.filename, "/data/big.bin");
        assert_eq!(entry.size, 150 * MB);
        assert_eq!(entry.blocks.len(), 3);
        for block in &entry.blocks {
            assert_eq!(block.replicas().len(), 2);
            assert_ne!(block.leader.node_id, block.followers[0].node_id);
        }

        let ids = entry.block_ids();
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
    }

    #[tokio::test]
    async fn test_empty_file_has_no_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = namenode_with(dir.path(), 3).await;

        let entry = namenode.create_file("/empty", 0).await.unwrap();

        assert!(entry.blocks.is_empty());
        assert_eq!(namenode.lookup_file("/empty").await.unwrap(), entry);
    }

    #[tokio::test]
    async fn test_create_file_creates_intermediate_directories() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = namenode_with(dir.path(), 2).await;

        namenode.create_file("/x/y/z.txt", 10).await.unwrap();

        assert_eq!(
            namenode.list_directory("/x").await.unwrap(),
            vec![DirEntry {
                name: "y".to_string(),
                kind: EntryKind::Directory
            }]
        );
        assert_eq!(
            namenode.list_directory("/x/y").await.unwrap(),
            vec![DirEntry {
                name: "z.txt".to_string(),
                kind: EntryKind::File
            }]
        );
    }

    #[tokio::test]
    async fn test_duplicate_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = namenode_with(dir.path(), 2).await;

        let first = namenode.create_file("/dup.txt", 5).await.unwrap();
        let second = namenode.create_file("/dup.txt", 7).await;

        assert!(matches!(second, Err(DfsError::AlreadyExists(_))));
        assert_eq!(namenode.lookup_file("/dup.txt").await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_file_over_a_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = namenode_with(dir.path(), 2).await;

        namenode.create_directory("/taken").await.unwrap();
        let result = namenode.create_file("/taken", 5).await;

        assert!(matches!(result, Err(DfsError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_placement_failure_leaves_namespace_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = namenode_with(dir.path(), 1).await;

        let result = namenode.create_file("/needs/two.bin", 100 * MB).await;

        match result {
            Err(DfsError::InsufficientReplicas { needed, available }) => {
                assert_eq!(needed, 2);
                assert_eq!(available, 1);
            }
            other => panic!("expected InsufficientReplicas, got {:?}", other),
        }
        assert!(matches!(
            namenode.lookup_file("/needs/two.bin").await,
            Err(DfsError::NotFound(_))
        ));
        assert!(namenode.list_directory("/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected_before_allocation() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = namenode_with(dir.path(), 3).await;

        let result = namenode.create_file("/huge.bin", u64::MAX).await;

        match result {
            Err(err @ DfsError::FileTooLarge { .. }) => {
                assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
            }
            other => panic!("expected FileTooLarge, got {:?}", other),
        }
        assert!(namenode.list_directory("/").await.unwrap().is_empty());
        assert!(!dir.path().join("namenode_state.json").exists());
    }

    #[tokio::test]
    async fn test_configured_file_size_limit_is_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = namenode_with(dir.path(), 3)
            .await
            .with_max_file_size(128 * MB);

        let at_limit = namenode.create_file("/at-limit.bin", 128 * MB).await.unwrap();
        assert_eq!(at_limit.blocks.len(), 2);

        let result = namenode.create_file("/over.bin", 128 * MB + 1).await;
        assert!(matches!(
            result,
            Err(DfsError::FileTooLarge { limit, .. }) if limit == 128 * MB
        ));
    }

    #[tokio::test]
    async fn test_lookup_of_unknown_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = namenode_with(dir.path(), 2).await;

        let result = namenode.lookup_file("/nope").await;
        assert!(matches!(result, Err(DfsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_file_removes_record_and_leaf() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = namenode_with(dir.path(), 2).await;

        namenode.create_file("/docs/a.txt", 3).await.unwrap();
        namenode.create_file("/docs/b.txt", 3).await.unwrap();

        let removed = namenode.delete_file("/docs/a.txt").await.unwrap();

        assert_eq!(removed.filename, "/docs/a.txt");
        let names: Vec<String> = namenode
            .list_directory("/docs")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["b.txt"]);
        assert!(matches!(
            namenode.delete_file("/docs/a.txt").await,
            Err(DfsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_creates_of_one_path_admit_a_single_winner() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = Arc::new(namenode_with(dir.path(), 3).await);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let namenode = namenode.clone();
            handles.push(tokio::spawn(async move {
                namenode.create_file("/race.bin", 70 * MB).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(DfsError::AlreadyExists(_)) => {}
                Err(e) => panic!("unexpected error: {:?}", e),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(namenode.snapshot().await.files.len(), 1);
    }

    // ============================================================
    // DIRECTORIES
    // ============================================================

    #[tokio::test]
    async fn test_directory_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = namenode_with(dir.path(), 2).await;

        namenode.create_directory("/a/b").await.unwrap();
        assert_eq!(
            namenode.list_directory("/a").await.unwrap(),
            vec![DirEntry {
                name: "b".to_string(),
                kind: EntryKind::Directory
            }]
        );

        namenode.delete_directory("/a/b").await.unwrap();
        assert!(namenode.list_directory("/a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_directory_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = namenode_with(dir.path(), 2).await;

        namenode.create_directory("/same").await.unwrap();
        namenode.create_file("/same/f", 1).await.unwrap();
        namenode.create_directory("/same/").await.unwrap();

        assert_eq!(namenode.list_directory("/same").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_directory_cascades_file_records() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = namenode_with(dir.path(), 2).await;

        namenode.create_file("/tree/one", 1).await.unwrap();
        namenode.create_file("/tree/sub/two", 1).await.unwrap();
        namenode.create_file("/keep", 1).await.unwrap();

        let mut removed = namenode.delete_directory("/tree").await.unwrap();
        removed.sort();

        assert_eq!(removed, vec!["/tree/one", "/tree/sub/two"]);
        let snapshot = namenode.snapshot().await;
        assert_eq!(snapshot.files.keys().collect::<Vec<_>>(), vec!["/keep"]);
    }

    #[tokio::test]
    async fn test_delete_missing_or_file_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = namenode_with(dir.path(), 2).await;
        namenode.create_file("/plain", 1).await.unwrap();

        assert!(matches!(
            namenode.delete_directory("/ghost").await,
            Err(DfsError::NotFound(_))
        ));
        assert!(matches!(
            namenode.delete_directory("/plain").await,
            Err(DfsError::NotFound(_))
        ));
        assert!(namenode.lookup_file("/plain").await.is_ok());
    }

    #[tokio::test]
    async fn test_root_cannot_be_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = namenode_with(dir.path(), 2).await;

        let result = namenode.delete_directory("/").await;
        assert!(matches!(result, Err(DfsError::InvalidPath { .. })));
    }

    #[tokio::test]
    async fn test_listing_renders_files_and_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = namenode_with(dir.path(), 2).await;

        namenode.create_file("/music/song.mp3", 4).await.unwrap();
        namenode.create_directory("/music/live").await.unwrap();

        let listing = namenode.listing("/").await.unwrap();

        assert_eq!(
            listing,
            serde_json::json!({ "music": { "live": {}, "song.mp3": "file" } })
        );
        assert!(matches!(
            namenode.listing("/music/song.mp3").await,
            Err(DfsError::NotFound(_))
        ));
    }

    // ============================================================
    // PERSISTENCE
    // ============================================================

    #[tokio::test]
    async fn test_restart_reproduces_namespace() {
        let dir = tempfile::tempdir().unwrap();

        let before = {
            let namenode = namenode_with(dir.path(), 3).await;
            namenode.create_file("/p/q.bin", 130 * MB).await.unwrap();
            namenode.create_directory("/empty/dir").await.unwrap();
            namenode.create_file("/r.txt", 1).await.unwrap();
            namenode.delete_file("/r.txt").await.unwrap();
            namenode.snapshot().await
        };

        let restarted = namenode_with(dir.path(), 3).await;

        assert_eq!(restarted.snapshot().await, before);
        assert_eq!(
            restarted.lookup_file("/p/q.bin").await.unwrap().blocks.len(),
            3
        );
    }

    #[tokio::test]
    async fn test_missing_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("absent.json"));

        let namespace = store.load(false).await.unwrap();

        assert_eq!(namespace, Namespace::default());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_fails_unless_reset_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("namenode_state.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let store = SnapshotStore::new(&path);

        assert!(matches!(store.load(false).await, Err(DfsError::Snapshot(_))));
        assert_eq!(store.load(true).await.unwrap(), Namespace::default());
    }

    #[tokio::test]
    async fn test_snapshot_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let namenode = namenode_with(dir.path(), 2).await;

        namenode.create_directory("/d").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["namenode_state.json"]);
    }
}
