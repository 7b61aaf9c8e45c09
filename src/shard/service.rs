use super::types::{NodeRole, PassthroughMatrix, PassthroughView, ShardSummary, ShardTopology};
use crate::error::{ServiceError, ServiceResult};
use crate::graph::engine::dijkstra;
use crate::graph::types::{Distance, DistanceMap, Edge, EdgeId, Graph};
use crate::graph::visitors::{DistanceCollector, PathError, PathRecord};
use crate::lease::types::LeaseEvent;
use crate::snapshot::layout::shard_topology_path;
use crate::snapshot::versioned::{ReadOutcome, VersionToken, VersionedSnapshotStore};

use anyhow::{Result, anyhow};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};

const LOAD_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Topology plus everything derived from it, all tagged with one token.
struct LoadedShard {
    name: String,
    token: VersionToken,
    topology: ShardTopology,
    graph: Graph,
    matrix: PassthroughMatrix,
}

impl LoadedShard {
    fn build(name: String, token: VersionToken, topology: ShardTopology) -> Self {
        let graph = topology.to_graph();
        let matrix = topology.passthrough_matrix(&graph);

        Self {
            name,
            token,
            topology,
            graph,
            matrix,
        }
    }

    fn summary(&self) -> ShardSummary {
        ShardSummary {
            shard: self.name.clone(),
            token: self.token.clone(),
            matrix: self.matrix.clone(),
            gateways: self.topology.gateways.iter().cloned().collect(),
            nodes: self.topology.nodes(),
        }
    }

    fn require_node(&self, node: &str) -> ServiceResult<()> {
        if self.topology.contains(node) {
            Ok(())
        } else {
            Err(ServiceError::UnknownNode(node.to_string()))
        }
    }
}

enum ShardState {
    Uninitialized,
    Synced(LoadedShard),
}

/// Serves the shard this worker currently leases.
///
/// Queries share a read lock. Each mutation holds the write lock while it edits a copy of
/// the topology, recomputes the passthrough matrix and persists the snapshot; the copy
/// replaces the live state only once the write succeeded.
pub struct ShardGraphService {
    snapshots: VersionedSnapshotStore,
    state: RwLock<ShardState>,
}

impl ShardGraphService {
    pub fn new(snapshots: VersionedSnapshotStore) -> Arc<Self> {
        Arc::new(Self {
            snapshots,
            state: RwLock::new(ShardState::Uninitialized),
        })
    }

    /// Name and token of the loaded shard, if any.
    pub async fn status(&self) -> Option<(String, VersionToken)> {
        match &*self.state.read().await {
            ShardState::Synced(loaded) => Some((loaded.name.clone(), loaded.token.clone())),
            ShardState::Uninitialized => None,
        }
    }

    pub async fn current_shard(&self) -> Option<String> {
        self.status().await.map(|(name, _)| name)
    }

    /// Fails unless `expected` (when given) is the shard being served.
    pub async fn ensure_serving(&self, expected: Option<&str>) -> ServiceResult<()> {
        let Some(expected) = expected else {
            return Ok(());
        };

        match self.current_shard().await {
            Some(current) if current == expected => Ok(()),
            Some(current) => Err(ServiceError::Unavailable(format!(
                "this worker serves {}, not {}",
                current, expected
            ))),
            None => Err(ServiceError::Unavailable(format!(
                "this worker serves no shard, not {}",
                expected
            ))),
        }
    }

    // ============================================================
    // LEASE HANDOFF
    // ============================================================

    /// Loads `shard` from the snapshot store; a shard never written starts empty.
    ///
    /// Reassignment of the shard already loaded only refetches when its token moved.
    pub async fn assign(&self, shard: &str) -> Result<()> {
        let path = shard_topology_path(shard);
        let mut state = self.state.write().await;

        let last_token = match &*state {
            ShardState::Synced(loaded) if loaded.name == shard => Some(loaded.token.clone()),
            _ => None,
        };

        let loaded = match self.snapshots.read_if_changed(&path, last_token.as_ref()).await? {
            ReadOutcome::Unchanged => {
                tracing::info!("Shard {} already loaded and current", shard);
                return Ok(());
            }
            ReadOutcome::Changed { data, token } => {
                let topology: ShardTopology = serde_json::from_slice(&data)
                    .map_err(|e| anyhow!("Corrupt topology snapshot for {}: {}", shard, e))?;
                LoadedShard::build(shard.to_string(), token, topology)
            }
            ReadOutcome::Missing => {
                tracing::info!("No snapshot for {}, starting empty", shard);
                LoadedShard::build(
                    shard.to_string(),
                    VersionToken::generate(),
                    ShardTopology::default(),
                )
            }
        };

        tracing::info!(
            "Loaded shard {} at {} ({} nodes, {} edges, {} gateways)",
            shard,
            loaded.token,
            loaded.graph.node_count(),
            loaded.topology.edges.len(),
            loaded.topology.gateways.len()
        );
        *state = ShardState::Synced(loaded);
        Ok(())
    }

    /// Drops the shard if it is the one loaded. Waits for an in-flight mutation to finish.
    pub async fn release(&self, shard: &str) {
        let mut state = self.state.write().await;
        if matches!(&*state, ShardState::Synced(loaded) if loaded.name == shard) {
            tracing::info!("Released shard {}", shard);
            *state = ShardState::Uninitialized;
        }
    }

    /// Applies lease events until the sender goes away. Failed loads are retried until
    /// they succeed or a newer event supersedes them.
    pub async fn follow_leases(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<LeaseEvent>) {
        let mut pending: Option<String> = None;

        loop {
            let event = match &pending {
                Some(shard) => tokio::select! {
                    event = events.recv() => event,
                    _ = tokio::time::sleep(LOAD_RETRY_INTERVAL) => {
                        Some(LeaseEvent::Acquired(shard.clone()))
                    }
                },
                None => events.recv().await,
            };

            let Some(event) = event else {
                break;
            };
            pending = None;

            match event {
                LeaseEvent::Acquired(shard) => {
                    if let Err(e) = self.assign(&shard).await {
                        tracing::error!("Failed to load shard {}: {}", shard, e);
                        pending = Some(shard);
                    }
                }
                LeaseEvent::Lost(shard) => self.release(&shard).await,
            }
        }

        tracing::info!("Lease event stream closed");
    }

    // ============================================================
    // MUTATIONS
    // ============================================================

    /// Runs `edit` on a copy of the topology. `edit` returns its result and whether the
    /// topology changed; unchanged edits skip recomputation and persistence.
    async fn mutate<T, F>(&self, edit: F) -> ServiceResult<T>
    where
        F: FnOnce(&mut ShardTopology) -> ServiceResult<(T, bool)>,
    {
        let mut state = self.state.write().await;
        let loaded = match &mut *state {
            ShardState::Synced(loaded) => loaded,
            ShardState::Uninitialized => {
                return Err(ServiceError::Unauthorized("no shard leased".to_string()));
            }
        };

        let mut topology = loaded.topology.clone();
        let (value, changed) = edit(&mut topology)?;
        if !changed {
            return Ok(value);
        }

        let next = LoadedShard::build(loaded.name.clone(), VersionToken::generate(), topology);
        let payload = serde_json::to_vec(&next.topology).map_err(|e| anyhow!(e))?;

        self.snapshots
            .write(&shard_topology_path(&next.name), payload, &next.token)
            .await
            .map_err(|e| ServiceError::Unavailable(format!("snapshot write failed: {}", e)))?;

        *loaded = next;
        Ok(value)
    }

    pub async fn add_node(&self, node: &str, role: NodeRole) -> ServiceResult<()> {
        self.mutate(|topology| {
            if topology.contains(node) {
                return Err(ServiceError::NodeExists(node.to_string()));
            }
            topology.insert_node(node, role);
            tracing::info!("Added {} node {}", role, node);
            Ok(((), true))
        })
        .await
    }

    /// Connects two nodes of this shard; both must already exist.
    pub async fn add_edge(&self, n1: &str, n2: &str, length: Distance) -> ServiceResult<EdgeId> {
        self.mutate(|topology| {
            for node in [n1, n2] {
                if !topology.contains(node) {
                    return Err(ServiceError::UnknownNode(node.to_string()));
                }
            }

            let id = EdgeId::new();
            topology.edges.push(Edge::new(n1, n2, id.clone(), length));
            tracing::info!("Added edge {} {} <-> {} ({})", id, n1, n2, length);
            Ok((id, true))
        })
        .await
    }

    pub async fn delete_edge(&self, id: &EdgeId) -> ServiceResult<()> {
        self.mutate(|topology| {
            if !topology.remove_edge(id) {
                return Err(ServiceError::UnknownEdge(id.to_string()));
            }
            tracing::info!("Deleted edge {}", id);
            Ok(((), true))
        })
        .await
    }

    /// Returns whether the role actually changed.
    pub async fn set_node_role(&self, node: &str, role: NodeRole) -> ServiceResult<bool> {
        self.mutate(|topology| {
            let changed = topology
                .set_role(node, role)
                .ok_or_else(|| ServiceError::UnknownNode(node.to_string()))?;
            if changed {
                tracing::info!("Node {} is now {}", node, role);
            }
            Ok((changed, changed))
        })
        .await
    }

    // ============================================================
    // QUERIES
    // ============================================================

    async fn read<T>(
        &self,
        query: impl FnOnce(&LoadedShard) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        match &*self.state.read().await {
            ShardState::Synced(loaded) => query(loaded),
            ShardState::Uninitialized => {
                Err(ServiceError::Unavailable("no shard loaded".to_string()))
            }
        }
    }

    /// Shortest path between two nodes of this shard, both ends included.
    pub async fn internal_connection(
        &self,
        n1: &str,
        n2: &str,
    ) -> ServiceResult<(Distance, Vec<String>)> {
        self.read(|loaded| {
            loaded.require_node(n1)?;
            loaded.require_node(n2)?;

            let mut record = PathRecord::new(n1, n2);
            dijkstra(n1, &loaded.graph, &mut record);

            match (record.reconstruct(), record.distance()) {
                (Ok(path), Some(distance)) => Ok((distance, path)),
                (Err(PathError::BrokenChain { node }), _) => Err(ServiceError::Internal(anyhow!(
                    "predecessor chain broken at {} in {}",
                    node,
                    loaded.name
                ))),
                _ => Err(ServiceError::NoRoute {
                    from: n1.to_string(),
                    to: n2.to_string(),
                }),
            }
        })
        .await
    }

    /// Distances from `n1` to every gateway it can reach.
    pub async fn gateway_distances(&self, n1: &str) -> ServiceResult<DistanceMap> {
        self.read(|loaded| {
            loaded.require_node(n1)?;

            let mut collector = DistanceCollector::new();
            dijkstra(n1, &loaded.graph, &mut collector);

            Ok(collector
                .into_distances()
                .into_iter()
                .filter(|(node, _)| loaded.topology.gateways.contains(node))
                .collect())
        })
        .await
    }

    /// The published summary, or `Unchanged` when the caller's token is current.
    pub async fn passthrough(
        &self,
        last_token: Option<&VersionToken>,
    ) -> ServiceResult<PassthroughView> {
        self.read(|loaded| {
            if last_token == Some(&loaded.token) {
                return Ok(PassthroughView::Unchanged);
            }
            Ok(PassthroughView::Changed(loaded.summary()))
        })
        .await
    }
}
