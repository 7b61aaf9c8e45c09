use super::client::ShardClient;
use super::types::{InterShardEdges, Route};
use crate::error::{ServiceError, ServiceResult};
use crate::graph::engine::{dijkstra, multi_source_dijkstra};
use crate::graph::types::{Distance, Edge, EdgeId, Graph};
use crate::graph::visitors::{DistanceCollector, PathRecord};
use crate::shard::types::{NodeRole, PassthroughView, ShardSummary};
use crate::snapshot::layout::FEDERATION_EDGES_PATH;
use crate::snapshot::versioned::{ReadOutcome, VersionToken, VersionedSnapshotStore};

use anyhow::anyhow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;

#[derive(Default)]
struct FederationCache {
    token: Option<VersionToken>,
    edges: InterShardEdges,
}

/// Everything one composition needs, fetched up front.
struct Federation {
    summaries: Vec<ShardSummary>,
    edges: InterShardEdges,
    owners: HashMap<String, String>,
    gateways: HashSet<String>,
}

impl Federation {
    fn new(summaries: Vec<ShardSummary>, edges: InterShardEdges) -> Self {
        let mut owners = HashMap::new();
        for summary in &summaries {
            for node in &summary.nodes {
                if let Some(previous) = owners.insert(node.clone(), summary.shard.clone()) {
                    tracing::warn!(
                        "Node {} claimed by both {} and {}",
                        node,
                        previous,
                        summary.shard
                    );
                }
            }
        }
        let gateways = summaries
            .iter()
            .flat_map(|summary| summary.gateways.iter().cloned())
            .collect();

        Self {
            summaries,
            edges,
            owners,
            gateways,
        }
    }

    /// Inter-shard edges whose endpoints are both still gateways. An edge touching a node
    /// demoted to internal stays in the set but carries no traffic.
    fn live_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges
            .edges
            .iter()
            .filter(move |edge| {
                self.gateways.contains(&edge.n1) && self.gateways.contains(&edge.n2)
            })
    }

    fn owner(&self, node: &str) -> ServiceResult<&str> {
        self.owners
            .get(node)
            .map(String::as_str)
            .ok_or_else(|| ServiceError::UnknownNode(node.to_string()))
    }

    /// Passthrough matrices plus inter-shard edges, keyed by gateway.
    fn gateway_graph(&self) -> Graph {
        let mut graph = Graph::new();

        for summary in &self.summaries {
            for gateway in &summary.gateways {
                graph.add_node(gateway.clone());
            }
            for (from, row) in &summary.matrix {
                for (to, distance) in row {
                    if from != to {
                        let id = EdgeId(format!("{}:{}:{}", summary.shard, from, to));
                        graph.add_edge(Edge::new(from.clone(), to.clone(), id, *distance));
                    }
                }
            }
        }

        for edge in self.live_edges() {
            graph.add_undirected(edge.clone());
        }

        graph
    }

    /// Shortest inter-shard edge joining `a` and `b`.
    fn hop_length(&self, a: &str, b: &str) -> Option<Distance> {
        self.live_edges()
            .filter(|edge| edge.connects(a, b))
            .map(|edge| edge.length)
            .min()
    }
}

/// Answers federation-wide route and distance queries.
///
/// Shard summaries and the inter-shard edge set are cached by version token; every request
/// revalidates them, so nothing stale is used once its owner has published a change. The
/// graph built from them lives for one request only.
pub struct FederatedRouter {
    client: Arc<dyn ShardClient>,
    snapshots: VersionedSnapshotStore,
    summaries: RwLock<HashMap<String, ShardSummary>>,
    federation: RwLock<FederationCache>,
    /// Serializes edits of the inter-shard edge set.
    edits: Mutex<()>,
}

impl FederatedRouter {
    pub fn new(client: Arc<dyn ShardClient>, snapshots: VersionedSnapshotStore) -> Arc<Self> {
        Arc::new(Self {
            client,
            snapshots,
            summaries: RwLock::new(HashMap::new()),
            federation: RwLock::new(FederationCache::default()),
            edits: Mutex::new(()),
        })
    }

    // ============================================================
    // SYNC
    // ============================================================

    /// Revalidates every shard's summary concurrently. Any failure aborts the whole
    /// refresh: composing without a shard would silently drop its edges.
    async fn refresh_summaries(&self) -> ServiceResult<Vec<ShardSummary>> {
        let shards = self.client.shards().await?;
        let cached = self.summaries.read().await.clone();

        let mut fetches = JoinSet::new();
        for (index, shard) in shards.iter().enumerate() {
            let client = self.client.clone();
            let shard = shard.clone();
            let token = cached.get(&shard).map(|summary| summary.token.clone());

            fetches.spawn(async move {
                let view = client.passthrough(&shard, token.as_ref()).await;
                (index, shard, view)
            });
        }

        let mut fresh: Vec<Option<ShardSummary>> = vec![None; shards.len()];
        while let Some(joined) = fetches.join_next().await {
            let (index, shard, view) =
                joined.map_err(|e| {
                    ServiceError::Internal(anyhow!("passthrough fetch panicked: {}", e))
                })?;

            let summary = match view {
                Ok(PassthroughView::Changed(summary)) => {
                    tracing::debug!("Shard {} summary now at {}", shard, summary.token);
                    summary
                }
                Ok(PassthroughView::Unchanged) => cached.get(&shard).cloned().ok_or_else(|| {
                    ServiceError::Internal(anyhow!(
                        "{} reported unchanged without a cached summary",
                        shard
                    ))
                })?,
                Err(e) => {
                    tracing::warn!("Passthrough fetch for {} failed: {}", shard, e);
                    return Err(ServiceError::Unavailable(format!("shard {}: {}", shard, e)));
                }
            };
            fresh[index] = Some(summary);
        }

        let summaries: Vec<ShardSummary> = fresh.into_iter().flatten().collect();

        let mut cache = self.summaries.write().await;
        cache.clear();
        for summary in &summaries {
            cache.insert(summary.shard.clone(), summary.clone());
        }

        Ok(summaries)
    }

    async fn refresh_edges(&self) -> ServiceResult<InterShardEdges> {
        let mut cache = self.federation.write().await;

        let outcome = self
            .snapshots
            .read_if_changed(FEDERATION_EDGES_PATH, cache.token.as_ref())
            .await
            .map_err(|e| ServiceError::Unavailable(format!("federation snapshot: {}", e)))?;

        match outcome {
            ReadOutcome::Unchanged => {}
            ReadOutcome::Changed { data, token } => {
                cache.edges = serde_json::from_slice(&data)
                    .map_err(|e| anyhow!("Corrupt federation snapshot: {}", e))?;
                cache.token = Some(token);
                tracing::debug!(
                    "Federation edges now at {:?} ({} edges)",
                    cache.token,
                    cache.edges.edges.len()
                );
            }
            ReadOutcome::Missing => {
                cache.edges = InterShardEdges::default();
                cache.token = None;
            }
        }

        Ok(cache.edges.clone())
    }

    async fn load(&self) -> ServiceResult<Federation> {
        let summaries = self.refresh_summaries().await?;
        let edges = self.refresh_edges().await?;
        Ok(Federation::new(summaries, edges))
    }

    /// Route inside one shard, `None` when the shard alone does not connect the two.
    async fn direct(
        &self,
        shard: &str,
        start: &str,
        end: &str,
    ) -> ServiceResult<Option<(Distance, Vec<String>)>> {
        match self.client.internal_connection(shard, start, end).await {
            Ok(found) => Ok(Some(found)),
            Err(ServiceError::NoRoute { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ============================================================
    // QUERIES
    // ============================================================

    pub async fn route(&self, start: &str, end: &str) -> ServiceResult<Route> {
        let federation = self.load().await?;
        let start_shard = federation.owner(start)?;
        let end_shard = federation.owner(end)?;

        let mut graph = federation.gateway_graph();
        for (gateway, distance) in self.client.gateway_distances(start_shard, start).await? {
            if gateway != start {
                let id = EdgeId(format!("from:{}:{}", start, gateway));
                graph.add_edge(Edge::new(start, gateway, id, distance));
            }
        }
        for (gateway, distance) in self.client.gateway_distances(end_shard, end).await? {
            if gateway != end {
                let id = EdgeId(format!("to:{}:{}", gateway, end));
                graph.add_edge(Edge::new(gateway, end, id, distance));
            }
        }

        let mut record = PathRecord::new(start, end);
        dijkstra(start, &graph, &mut record);
        let composed = match (record.distance(), record.reconstruct()) {
            (Some(distance), Ok(path)) => Some((distance, path)),
            _ => None,
        };

        let direct = if start_shard == end_shard {
            self.direct(start_shard, start, end).await?
        } else {
            None
        };

        // On a tie the single-shard route wins: it needs no stitching.
        let route = match (direct, composed) {
            (Some((d, path)), Some((c, _))) if d <= c => Route { distance: d, path },
            (Some((d, path)), None) => Route { distance: d, path },
            (_, Some((c, abstract_path))) => self.stitch(&federation, c, &abstract_path).await?,
            (None, None) => {
                return Err(ServiceError::NoRoute {
                    from: start.to_string(),
                    to: end.to_string(),
                });
            }
        };

        tracing::info!(
            "Route {} -> {}: distance {} over {} node(s)",
            start,
            end,
            route.distance,
            route.path.len()
        );
        Ok(route)
    }

    /// Replaces every same-shard step of `abstract_path` by the shard's concrete path.
    async fn stitch(
        &self,
        federation: &Federation,
        expected: Distance,
        abstract_path: &[String],
    ) -> ServiceResult<Route> {
        let mut path: Vec<String> = abstract_path.iter().take(1).cloned().collect();
        let mut total: Distance = 0;

        for step in abstract_path.windows(2) {
            let (a, b) = (step[0].as_str(), step[1].as_str());
            let same_shard = match (federation.owners.get(a), federation.owners.get(b)) {
                (Some(sa), Some(sb)) if sa == sb => Some(sa.as_str()),
                _ => None,
            };

            match same_shard {
                Some(shard) => {
                    let (distance, segment) = self.client.internal_connection(shard, a, b).await?;
                    total = total.saturating_add(distance);
                    path.extend(segment.into_iter().skip(1));
                }
                None => {
                    let hop = federation.hop_length(a, b).ok_or_else(|| {
                        ServiceError::Internal(anyhow!(
                            "no inter-shard edge between {} and {}",
                            a,
                            b
                        ))
                    })?;
                    total = total.saturating_add(hop);
                    path.push(b.to_string());
                }
            }
        }

        if total != expected {
            tracing::warn!(
                "Stitched route measures {} but composition promised {}; \
                 a shard changed mid-request",
                total,
                expected
            );
        }

        Ok(Route { distance: total, path })
    }

    pub async fn distance(&self, start: &str, end: &str) -> ServiceResult<Distance> {
        let federation = self.load().await?;
        let start_shard = federation.owner(start)?;
        let end_shard = federation.owner(end)?;

        let mut graph = federation.gateway_graph();
        for (gateway, distance) in self.client.gateway_distances(end_shard, end).await? {
            if gateway != end {
                let id = EdgeId(format!("to:{}:{}", gateway, end));
                graph.add_edge(Edge::new(gateway, end, id, distance));
            }
        }

        // Seeding the search with start's gateway distances stands in for start itself.
        let mut sources: Vec<(String, Distance)> = self
            .client
            .gateway_distances(start_shard, start)
            .await?
            .into_iter()
            .collect();
        sources.sort();

        let mut collector = DistanceCollector::new();
        multi_source_dijkstra(&sources, &graph, &mut collector);
        let composed = collector.get(end);

        let direct = if start_shard == end_shard {
            self.direct(start_shard, start, end).await?.map(|(d, _)| d)
        } else {
            None
        };

        let best = match (direct, composed) {
            (Some(d), Some(c)) => d.min(c),
            (Some(d), None) | (None, Some(d)) => d,
            (None, None) => {
                return Err(ServiceError::NoRoute {
                    from: start.to_string(),
                    to: end.to_string(),
                });
            }
        };

        tracing::info!("Distance {} -> {}: {}", start, end, best);
        Ok(best)
    }

    // ============================================================
    // MUTATIONS
    // ============================================================

    /// Same-shard edges go to the owning worker. Cross-shard edges promote both endpoints
    /// to gateways and join the federation edge set.
    pub async fn add_edge(&self, n1: &str, n2: &str, length: Distance) -> ServiceResult<EdgeId> {
        let summaries = self.refresh_summaries().await?;
        let federation = Federation::new(summaries, InterShardEdges::default());
        let s1 = federation.owner(n1)?;
        let s2 = federation.owner(n2)?;

        if s1 == s2 {
            return self.client.add_edge(s1, n1, n2, length).await;
        }

        let _guard = self.edits.lock().await;
        let mut promoted = Vec::new();
        match self.link(&[(s1, n1), (s2, n2)], length, &mut promoted).await {
            Ok(id) => {
                tracing::info!(
                    "Added inter-shard edge {} {} ({}) <-> {} ({})",
                    id,
                    n1,
                    s1,
                    n2,
                    s2
                );
                Ok(id)
            }
            Err(e) => {
                self.demote(&promoted).await;
                Err(e)
            }
        }
    }

    /// Promotes both endpoints, then publishes the edge. `promoted` collects the endpoints
    /// this call turned into gateways.
    async fn link<'a>(
        &self,
        ends: &[(&'a str, &'a str); 2],
        length: Distance,
        promoted: &mut Vec<(&'a str, &'a str)>,
    ) -> ServiceResult<EdgeId> {
        for &(shard, node) in ends {
            if self.client.set_node_role(shard, node, NodeRole::External).await? {
                promoted.push((shard, node));
            }
        }

        let mut edges = self.refresh_edges().await?;
        let id = EdgeId::new();
        edges.edges.push(Edge::new(ends[0].1, ends[1].1, id.clone(), length));
        self.publish_edges(edges).await?;
        Ok(id)
    }

    /// Undoes promotions of an edge that was never published.
    async fn demote(&self, promoted: &[(&str, &str)]) {
        for &(shard, node) in promoted {
            match self.client.set_node_role(shard, node, NodeRole::Internal).await {
                Ok(_) => tracing::info!("Demoted {} on {} after failed edge insert", node, shard),
                Err(e) => tracing::warn!("{} left as gateway on {}: {}", node, shard, e),
            }
        }
    }

    /// Looks in the federation edge set first, then asks each shard in turn.
    pub async fn delete_edge(&self, id: &EdgeId) -> ServiceResult<()> {
        {
            let _guard = self.edits.lock().await;
            let mut edges = self.refresh_edges().await?;
            let before = edges.edges.len();
            edges.edges.retain(|edge| &edge.id != id);

            if edges.edges.len() != before {
                self.publish_edges(edges).await?;
                tracing::info!("Deleted inter-shard edge {}", id);
                return Ok(());
            }
        }

        let mut failure = None;
        for shard in self.client.shards().await? {
            match self.client.delete_edge(&shard, id).await {
                Ok(()) => return Ok(()),
                Err(ServiceError::UnknownEdge(_)) => {}
                Err(e) => {
                    tracing::warn!("Could not ask {} about edge {}: {}", shard, id, e);
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }

        // An unreachable shard might have owned the edge.
        Err(failure.unwrap_or_else(|| ServiceError::UnknownEdge(id.to_string())))
    }

    async fn publish_edges(&self, edges: InterShardEdges) -> ServiceResult<()> {
        let token = VersionToken::generate();
        let payload = serde_json::to_vec(&edges).map_err(|e| anyhow!(e))?;

        self.snapshots
            .write(FEDERATION_EDGES_PATH, payload, &token)
            .await
            .map_err(|e| ServiceError::Unavailable(format!("federation snapshot write: {}", e)))?;

        let mut cache = self.federation.write().await;
        cache.token = Some(token);
        cache.edges = edges;
        Ok(())
    }
}

