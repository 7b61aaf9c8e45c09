use crate::error::ServiceError;
use crate::graph::engine::dijkstra;
use crate::graph::types::{Distance, Edge, EdgeId, Graph};
use crate::graph::visitors::DistanceCollector;
use crate::snapshot::versioned::VersionToken;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Whether a node is visible to the federation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Internal,
    /// Gateway node, reachable from other shards.
    External,
}

impl FromStr for NodeRole {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "internal" => Ok(NodeRole::Internal),
            "external" | "gateway" => Ok(NodeRole::External),
            other => Err(ServiceError::BadRequest(format!("unknown node role '{}'", other))),
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Internal => f.write_str("internal"),
            NodeRole::External => f.write_str("external"),
        }
    }
}

/// Gateway to gateway shortest distances within one shard. Unreachable pairs are absent.
pub type PassthroughMatrix = BTreeMap<String, BTreeMap<String, Distance>>;

/// Persisted form of a shard: its nodes split by role and its undirected edges.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShardTopology {
    pub internal: BTreeSet<String>,
    pub gateways: BTreeSet<String>,
    /// One entry per undirected connection.
    pub edges: Vec<Edge>,
}

impl ShardTopology {
    pub fn contains(&self, node: &str) -> bool {
        self.internal.contains(node) || self.gateways.contains(node)
    }

    pub fn role_of(&self, node: &str) -> Option<NodeRole> {
        if self.gateways.contains(node) {
            Some(NodeRole::External)
        } else if self.internal.contains(node) {
            Some(NodeRole::Internal)
        } else {
            None
        }
    }

    /// All nodes, gateways and internal alike, in sorted order.
    pub fn nodes(&self) -> Vec<String> {
        self.internal.union(&self.gateways).cloned().collect()
    }

    pub fn insert_node(&mut self, node: impl Into<String>, role: NodeRole) {
        let node = node.into();
        match role {
            NodeRole::Internal => self.internal.insert(node),
            NodeRole::External => self.gateways.insert(node),
        };
    }

    /// Moves `node` into `role`. Returns whether anything changed; `None` for unknown nodes.
    pub fn set_role(&mut self, node: &str, role: NodeRole) -> Option<bool> {
        let current = self.role_of(node)?;
        if current == role {
            return Some(false);
        }

        match role {
            NodeRole::Internal => self.gateways.remove(node),
            NodeRole::External => self.internal.remove(node),
        };
        self.insert_node(node, role);
        Some(true)
    }

    pub fn remove_edge(&mut self, id: &EdgeId) -> bool {
        let before = self.edges.len();
        self.edges.retain(|edge| &edge.id != id);
        self.edges.len() != before
    }

    pub fn to_graph(&self) -> Graph {
        let mut graph = Graph::new();
        for node in self.internal.iter().chain(self.gateways.iter()) {
            graph.add_node(node.clone());
        }
        for edge in &self.edges {
            graph.add_undirected(edge.clone());
        }
        graph
    }

    /// One full Dijkstra per gateway.
    pub fn passthrough_matrix(&self, graph: &Graph) -> PassthroughMatrix {
        self.gateways
            .iter()
            .map(|gateway| {
                let mut collector = DistanceCollector::new();
                dijkstra(gateway, graph, &mut collector);

                let row = collector
                    .into_distances()
                    .into_iter()
                    .filter(|(node, _)| self.gateways.contains(node))
                    .collect();
                (gateway.clone(), row)
            })
            .collect()
    }
}

/// What a shard publishes to the federation under one version token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShardSummary {
    pub shard: String,
    pub token: VersionToken,
    pub matrix: PassthroughMatrix,
    pub gateways: Vec<String>,
    pub nodes: Vec<String>,
}

/// Answer to a conditional passthrough fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassthroughView {
    Unchanged,
    Changed(ShardSummary),
}
