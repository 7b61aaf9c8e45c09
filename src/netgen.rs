//! Random federated networks.
//!
//! Each group becomes one shard: its nodes are joined by a random spanning tree plus a few
//! extra edges, and a random subset of them are gateways. Groups are in turn joined by a
//! random spanning tree of inter-shard edges plus extras, whose endpoints are promoted to
//! gateways. Used to seed a fresh cluster and to cross-check federated routing against a
//! single Dijkstra over the union of all edges.

use crate::graph::types::{Distance, Edge, EdgeId, Graph};
use crate::router::types::InterShardEdges;
use crate::shard::types::{NodeRole, ShardTopology};
use crate::snapshot::layout::{FEDERATION_EDGES_PATH, shard_topology_path};
use crate::snapshot::versioned::{VersionToken, VersionedSnapshotStore};

use anyhow::Result;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct NetworkParams {
    pub groups: usize,
    pub min_nodes: usize,
    pub max_nodes: usize,
    pub max_gateways: usize,
    pub max_extra_internal: usize,
    pub max_extra_external: usize,
    pub min_length: Distance,
    pub max_length: Distance,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            groups: 3,
            min_nodes: 5,
            max_nodes: 7,
            max_gateways: 2,
            max_extra_internal: 3,
            max_extra_external: 2,
            min_length: 1,
            max_length: 10,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeneratedNetwork {
    pub shards: BTreeMap<String, ShardTopology>,
    pub inter_shard: Vec<Edge>,
}

impl GeneratedNetwork {
    /// Every node and edge of the federation in one graph.
    pub fn union_graph(&self) -> Graph {
        let mut graph = Graph::new();
        for topology in self.shards.values() {
            let shard_graph = topology.to_graph();
            for node in shard_graph.nodes() {
                graph.add_node(node.clone());
                for edge in shard_graph.neighbors(node) {
                    graph.add_edge(edge.clone());
                }
            }
        }
        for edge in &self.inter_shard {
            graph.add_undirected(edge.clone());
        }
        graph
    }

    /// Writes every shard topology and the inter-shard edge set as fresh snapshots.
    pub async fn publish(&self, snapshots: &VersionedSnapshotStore) -> Result<()> {
        for (shard, topology) in &self.shards {
            snapshots
                .write(
                    &shard_topology_path(shard),
                    serde_json::to_vec(topology)?,
                    &VersionToken::generate(),
                )
                .await?;
        }

        let federation = InterShardEdges {
            edges: self.inter_shard.clone(),
        };
        snapshots
            .write(
                FEDERATION_EDGES_PATH,
                serde_json::to_vec(&federation)?,
                &VersionToken::generate(),
            )
            .await?;

        tracing::info!(
            "Published {} shard(s) and {} inter-shard edge(s)",
            self.shards.len(),
            self.inter_shard.len()
        );
        Ok(())
    }
}

/// "A".."Z", then "AA", "AB", ...
pub fn group_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Pairs of indices forming a random spanning tree over `count` items.
fn spanning_tree<R: Rng>(count: usize, rng: &mut R) -> Vec<(usize, usize)> {
    let mut order: Vec<usize> = (0..count).collect();
    order.shuffle(rng);

    (1..order.len())
        .map(|i| (order[rng.gen_range(0..i)], order[i]))
        .collect()
}

/// Up to `max_extra` random distinct pairs that are not already connected.
fn extra_pairs<R: Rng>(
    count: usize,
    max_extra: usize,
    existing: &mut Vec<(usize, usize)>,
    rng: &mut R,
) {
    if count < 2 {
        return;
    }

    for _ in 0..rng.gen_range(0..=max_extra) {
        let a = rng.gen_range(0..count);
        let b = rng.gen_range(0..count);
        if a == b || existing.iter().any(|&(x, y)| (x, y) == (a, b) || (x, y) == (b, a)) {
            continue;
        }
        existing.push((a, b));
    }
}

pub fn generate_network<R: Rng>(params: &NetworkParams, rng: &mut R) -> GeneratedNetwork {
    let mut network = GeneratedNetwork::default();
    let mut members: Vec<Vec<String>> = Vec::with_capacity(params.groups);
    let max_length = params.max_length.max(params.min_length);
    let length = |rng: &mut R| rng.gen_range(params.min_length..=max_length);
    let min_nodes = params.min_nodes.max(1);

    for index in 0..params.groups {
        let group = group_name(index);
        let count = rng.gen_range(min_nodes..=params.max_nodes.max(min_nodes));
        let nodes: Vec<String> = (1..=count).map(|i| format!("{}{}", group, i)).collect();

        let mut pairs = spanning_tree(count, rng);
        extra_pairs(count, params.max_extra_internal, &mut pairs, rng);

        let gateway_count = rng.gen_range(1..=params.max_gateways.clamp(1, count));
        let gateways: Vec<&String> = nodes.choose_multiple(rng, gateway_count).collect();

        let mut topology = ShardTopology::default();
        for node in &nodes {
            let role = if gateways.contains(&node) {
                NodeRole::External
            } else {
                NodeRole::Internal
            };
            topology.insert_node(node.clone(), role);
        }
        for (a, b) in pairs {
            let (n1, n2) = (nodes[a].clone(), nodes[b].clone());
            topology.edges.push(Edge::new(n1, n2, EdgeId::new(), length(&mut *rng)));
        }

        network.shards.insert(group, topology);
        members.push(nodes);
    }

    let mut links = spanning_tree(params.groups, rng);
    extra_pairs(params.groups, params.max_extra_external, &mut links, rng);

    for (a, b) in links {
        let n1 = members[a].choose(rng).cloned();
        let n2 = members[b].choose(rng).cloned();
        let (Some(n1), Some(n2)) = (n1, n2) else {
            continue;
        };

        for (group, node) in [(a, &n1), (b, &n2)] {
            if let Some(topology) = network.shards.get_mut(&group_name(group)) {
                topology.set_role(node, NodeRole::External);
            }
        }
        network.inter_shard.push(Edge::new(n1, n2, EdgeId::new(), length(&mut *rng)));
    }

    network
}
