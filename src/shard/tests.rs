//! Shard Module Tests
//!
//! ## Test Scopes
//! - **State Machine**: Uninitialized versus synced behavior, assignment, release and
//!   the lease event loop.
//! - **Queries**: Internal connections, gateway distances and the passthrough matrix on
//!   the reference triangle.
//! - **Mutations**: Validation, versioning, persistence and failure atomicity.
//! - **Handlers**: Path parsing and misdirected-request detection.

#[cfg(test)]
mod tests {
    use crate::error::ServiceError;
    use crate::graph::types::EdgeId;
    use crate::lease::types::LeaseEvent;
    use crate::shard::handlers::{
        handle_add_edge, handle_internal_connection, handle_passthrough, handle_status,
    };
    use crate::shard::protocol::{NO_TOKEN, ShardQuery};
    use crate::shard::service::ShardGraphService;
    use crate::shard::types::{NodeRole, PassthroughView, ShardTopology};
    use crate::snapshot::layout::shard_topology_path;
    use crate::snapshot::store::{BlobStore, MemoryBlobStore};
    use crate::snapshot::versioned::{ReadOutcome, VersionedSnapshotStore};
    use anyhow::Result;
    use async_trait::async_trait;
    use axum::extract::{Extension, Path, Query};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Memory store whose writes can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryBlobStore,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl BlobStore for FlakyStore {
        async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
            self.inner.get(path).await
        }

        async fn put(&self, path: &str, data: Vec<u8>) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                anyhow::bail!("blob store offline");
            }
            self.inner.put(path, data).await
        }

        async fn list(&self, prefix: &str) -> Result<Vec<String>> {
            self.inner.list(prefix).await
        }
    }

    fn snapshots() -> VersionedSnapshotStore {
        VersionedSnapshotStore::new(Arc::new(MemoryBlobStore::new()))
    }

    /// Triangle v1-v2 (2), v1-v3 (4), v2-v3 (1) with gateways v1 and v3.
    async fn triangle(snapshots: VersionedSnapshotStore) -> Arc<ShardGraphService> {
        let service = ShardGraphService::new(snapshots);
        service.assign("s1").await.unwrap();

        service.add_node("v1", NodeRole::External).await.unwrap();
        service.add_node("v2", NodeRole::Internal).await.unwrap();
        service.add_node("v3", NodeRole::External).await.unwrap();
        service.add_edge("v1", "v2", 2).await.unwrap();
        service.add_edge("v1", "v3", 4).await.unwrap();
        service.add_edge("v2", "v3", 1).await.unwrap();

        service
    }

    async fn summary_of(service: &ShardGraphService) -> crate::shard::types::ShardSummary {
        match service.passthrough(None).await.unwrap() {
            PassthroughView::Changed(summary) => summary,
            PassthroughView::Unchanged => panic!("no summary without a token"),
        }
    }

    // ============================================================
    // STATE MACHINE
    // ============================================================

    #[tokio::test]
    async fn test_uninitialized_rejects_mutations_and_queries() {
        let service = ShardGraphService::new(snapshots());

        let mutation = service.add_node("v1", NodeRole::Internal).await;
        let query = service.internal_connection("v1", "v2").await;

        assert!(matches!(mutation, Err(ServiceError::Unauthorized(_))));
        assert!(matches!(query, Err(ServiceError::Unavailable(_))));
        assert_eq!(service.status().await, None);
    }

    #[tokio::test]
    async fn test_assign_without_snapshot_starts_empty() {
        let service = ShardGraphService::new(snapshots());

        service.assign("fresh").await.unwrap();
        let summary = summary_of(&service).await;

        assert_eq!(service.current_shard().await, Some("fresh".to_string()));
        assert!(summary.nodes.is_empty());
        assert!(summary.matrix.is_empty());
    }

    #[tokio::test]
    async fn test_reload_restores_persisted_topology() {
        let store = snapshots();
        let writer = triangle(store.clone()).await;
        let (_, token) = writer.status().await.unwrap();

        let successor = ShardGraphService::new(store);
        successor.assign("s1").await.unwrap();

        assert_eq!(successor.status().await, Some(("s1".to_string(), token)));
        assert_eq!(
            successor.internal_connection("v1", "v3").await.unwrap(),
            (3, vec!["v1".to_string(), "v2".to_string(), "v3".to_string()])
        );
    }

    #[tokio::test]
    async fn test_reassign_same_shard_keeps_token() {
        let service = triangle(snapshots()).await;
        let before = service.status().await;

        service.assign("s1").await.unwrap();

        assert_eq!(service.status().await, before);
    }

    #[tokio::test]
    async fn test_release_only_drops_named_shard() {
        let service = triangle(snapshots()).await;

        service.release("other").await;
        assert_eq!(service.current_shard().await, Some("s1".to_string()));

        service.release("s1").await;
        assert_eq!(service.current_shard().await, None);
        assert!(matches!(
            service.add_edge("v1", "v2", 1).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_follow_leases_applies_events() {
        let service = ShardGraphService::new(snapshots());
        let (tx, rx) = mpsc::unbounded_channel();
        let follower = tokio::spawn(service.clone().follow_leases(rx));

        tx.send(LeaseEvent::Acquired("s1".into())).unwrap();
        wait_for(&service, Some("s1")).await;

        tx.send(LeaseEvent::Lost("s1".into())).unwrap();
        tx.send(LeaseEvent::Acquired("s2".into())).unwrap();
        wait_for(&service, Some("s2")).await;

        tx.send(LeaseEvent::Lost("s2".into())).unwrap();
        wait_for(&service, None).await;

        drop(tx);
        follower.await.unwrap();
    }

    async fn wait_for(service: &ShardGraphService, shard: Option<&str>) {
        for _ in 0..200 {
            if service.current_shard().await.as_deref() == shard {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("service never reached shard {:?}", shard);
    }

    // ============================================================
    // QUERIES
    // ============================================================

    #[tokio::test]
    async fn test_internal_connection_follows_shortest_path() {
        let service = triangle(snapshots()).await;

        let (distance, path) = service.internal_connection("v1", "v3").await.unwrap();

        assert_eq!(distance, 3);
        assert_eq!(path, vec!["v1", "v2", "v3"]);
    }

    #[tokio::test]
    async fn test_internal_connection_to_self() {
        let service = triangle(snapshots()).await;

        let (distance, path) = service.internal_connection("v2", "v2").await.unwrap();

        assert_eq!(distance, 0);
        assert_eq!(path, vec!["v2"]);
    }

    #[tokio::test]
    async fn test_unknown_node_and_no_route_are_distinct() {
        let service = triangle(snapshots()).await;
        service.add_node("island", NodeRole::Internal).await.unwrap();

        let unknown = service.internal_connection("v1", "nowhere").await;
        let disconnected = service.internal_connection("v1", "island").await;

        assert!(matches!(unknown, Err(ServiceError::UnknownNode(n)) if n == "nowhere"));
        assert!(matches!(
            disconnected,
            Err(ServiceError::NoRoute { from, to }) if from == "v1" && to == "island"
        ));
    }

    #[tokio::test]
    async fn test_gateway_distances_only_report_gateways() {
        let service = triangle(snapshots()).await;

        let distances = service.gateway_distances("v2").await.unwrap();

        assert_eq!(
            distances,
            HashMap::from([("v1".to_string(), 2), ("v3".to_string(), 1)])
        );
        assert!(matches!(
            service.gateway_distances("ghost").await,
            Err(ServiceError::UnknownNode(_))
        ));
    }

    #[tokio::test]
    async fn test_passthrough_matrix_covers_gateway_pairs() {
        let service = triangle(snapshots()).await;

        let summary = summary_of(&service).await;

        let expected = BTreeMap::from([
            (
                "v1".to_string(),
                BTreeMap::from([("v1".to_string(), 0), ("v3".to_string(), 3)]),
            ),
            (
                "v3".to_string(),
                BTreeMap::from([("v1".to_string(), 3), ("v3".to_string(), 0)]),
            ),
        ]);
        assert_eq!(summary.matrix, expected);
        assert_eq!(summary.gateways, vec!["v1", "v3"]);
        assert_eq!(summary.nodes, vec!["v1", "v2", "v3"]);
    }

    #[tokio::test]
    async fn test_passthrough_unchanged_for_current_token() {
        let service = triangle(snapshots()).await;
        let summary = summary_of(&service).await;

        let view = service.passthrough(Some(&summary.token)).await.unwrap();

        assert_eq!(view, PassthroughView::Unchanged);
    }

    // ============================================================
    // MUTATIONS
    // ============================================================

    #[tokio::test]
    async fn test_mutation_changes_token_and_matrix() {
        let service = triangle(snapshots()).await;
        let before = summary_of(&service).await;

        service.add_edge("v1", "v3", 1).await.unwrap();

        match service.passthrough(Some(&before.token)).await.unwrap() {
            PassthroughView::Changed(after) => {
                assert_ne!(after.token, before.token);
                assert_eq!(after.matrix["v1"]["v3"], 1);
            }
            PassthroughView::Unchanged => panic!("token must move after a mutation"),
        }
    }

    #[tokio::test]
    async fn test_add_edge_requires_existing_nodes() {
        let service = triangle(snapshots()).await;
        let before = service.status().await;

        let result = service.add_edge("v1", "v9", 5).await;

        assert!(matches!(result, Err(ServiceError::UnknownNode(n)) if n == "v9"));
        assert_eq!(service.status().await, before);
    }

    #[tokio::test]
    async fn test_add_node_rejects_duplicates() {
        let service = triangle(snapshots()).await;

        let result = service.add_node("v2", NodeRole::External).await;

        assert!(matches!(result, Err(ServiceError::NodeExists(n)) if n == "v2"));
    }

    #[tokio::test]
    async fn test_delete_edge_is_idempotent_not_found() {
        let service = triangle(snapshots()).await;
        let id = service.add_edge("v1", "v3", 1).await.unwrap();
        assert_eq!(service.internal_connection("v1", "v3").await.unwrap().0, 1);

        service.delete_edge(&id).await.unwrap();
        let token = service.status().await;
        let again = service.delete_edge(&id).await;

        assert!(matches!(again, Err(ServiceError::UnknownEdge(_))));
        assert_eq!(service.status().await, token);
        assert_eq!(service.internal_connection("v1", "v3").await.unwrap().0, 3);
        assert!(matches!(
            service.delete_edge(&EdgeId("never-existed".into())).await,
            Err(ServiceError::UnknownEdge(_))
        ));
    }

    #[tokio::test]
    async fn test_set_node_role_moves_between_sets() {
        let service = triangle(snapshots()).await;
        let before = service.status().await;

        let noop = service.set_node_role("v1", NodeRole::External).await.unwrap();
        assert!(!noop);
        assert_eq!(service.status().await, before);

        let promoted = service.set_node_role("v2", NodeRole::External).await.unwrap();
        let summary = summary_of(&service).await;

        assert!(promoted);
        assert_eq!(summary.gateways, vec!["v1", "v2", "v3"]);
        assert_eq!(summary.matrix["v2"]["v1"], 2);

        let demoted = service.set_node_role("v1", NodeRole::Internal).await.unwrap();
        assert!(demoted);
        assert!(!summary_of(&service).await.matrix.contains_key("v1"));

        assert!(matches!(
            service.set_node_role("ghost", NodeRole::Internal).await,
            Err(ServiceError::UnknownNode(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_state_untouched() {
        let blobs = Arc::new(FlakyStore::default());
        let store = VersionedSnapshotStore::new(blobs.clone());
        let service = triangle(store.clone()).await;
        let before = service.status().await;

        blobs.fail_writes.store(true, Ordering::SeqCst);
        let result = service.add_edge("v1", "v3", 1).await;

        assert!(matches!(result, Err(ServiceError::Unavailable(_))));
        assert_eq!(service.status().await, before);
        assert_eq!(service.internal_connection("v1", "v3").await.unwrap().0, 3);
    }

    #[tokio::test]
    async fn test_persisted_snapshot_matches_live_state() {
        let store = snapshots();
        let service = triangle(store.clone()).await;
        let (_, token) = service.status().await.unwrap();

        let outcome = store
            .read_if_changed(&shard_topology_path("s1"), None)
            .await
            .unwrap();

        match outcome {
            ReadOutcome::Changed { data, token: stored } => {
                let topology: ShardTopology = serde_json::from_slice(&data).unwrap();
                assert_eq!(stored, token);
                assert_eq!(topology.edges.len(), 3);
                assert_eq!(topology.role_of("v2"), Some(NodeRole::Internal));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_mutations_are_serialized() {
        let service = triangle(snapshots()).await;

        let mut handles = Vec::new();
        for i in 0..16 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.add_node(&format!("n{}", i), NodeRole::External).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let summary = summary_of(&service).await;
        assert_eq!(summary.nodes.len(), 19);
        assert_eq!(summary.gateways.len(), 18);
    }

    // ============================================================
    // TYPES & HANDLERS
    // ============================================================

    #[test]
    fn test_node_role_parsing() {
        assert_eq!("internal".parse::<NodeRole>().unwrap(), NodeRole::Internal);
        assert_eq!("external".parse::<NodeRole>().unwrap(), NodeRole::External);
        assert_eq!("Gateway".parse::<NodeRole>().unwrap(), NodeRole::External);
        assert!(matches!(
            "router".parse::<NodeRole>(),
            Err(ServiceError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_handlers_detect_misdirected_requests() {
        let service = triangle(snapshots()).await;

        let wrong = handle_internal_connection(
            Extension(service.clone()),
            Path(("v1".to_string(), "v3".to_string())),
            Query(ShardQuery {
                shard: Some("s2".to_string()),
            }),
        )
        .await;
        let right = handle_internal_connection(
            Extension(service.clone()),
            Path(("v1".to_string(), "v3".to_string())),
            Query(ShardQuery {
                shard: Some("s1".to_string()),
            }),
        )
        .await
        .unwrap();

        assert!(matches!(wrong, Err(ServiceError::Unavailable(_))));
        assert_eq!(right.0.distance, 3);
    }

    #[tokio::test]
    async fn test_passthrough_handler_without_token() {
        let service = triangle(snapshots()).await;
        let status = handle_status(Extension(service.clone())).await.unwrap();

        let fresh = handle_passthrough(
            Extension(service.clone()),
            Path(NO_TOKEN.to_string()),
            Query(ShardQuery::default()),
        )
        .await
        .unwrap();
        let cached = handle_passthrough(
            Extension(service.clone()),
            Path(status.0.token.to_string()),
            Query(ShardQuery::default()),
        )
        .await
        .unwrap();

        assert!(fresh.0.changed);
        assert_eq!(fresh.0.token, Some(status.0.token.clone()));
        assert_eq!(fresh.0.nodes.as_ref().map(|n| n.len()), Some(3));
        assert!(!cached.0.changed);
        assert!(cached.0.matrix.is_none());
    }

    #[tokio::test]
    async fn test_add_edge_handler_rejects_bad_length() {
        let service = triangle(snapshots()).await;

        let result = handle_add_edge(
            Extension(service),
            Path(("v1".to_string(), "v3".to_string(), "-4".to_string())),
            Query(ShardQuery::default()),
        )
        .await;

        assert!(matches!(result, Err(ServiceError::BadRequest(_))));
    }
}
