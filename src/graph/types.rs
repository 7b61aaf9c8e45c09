use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Non-negative path length. An unreached node simply has no entry.
pub type Distance = u64;

/// Shortest known distance per node, measured from a fixed source.
pub type DistanceMap = HashMap<String, Distance>;

/// Globally unique identifier of an undirected edge.
///
/// Both half-edges of one connection carry the same id, so deleting by id removes the
/// connection in both directions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub String);

impl EdgeId {
    /// Generates a new random UUID v4-based EdgeId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A directed half-edge `n1 -> n2`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Edge {
    pub n1: String,
    pub n2: String,
    pub id: EdgeId,
    pub length: Distance,
}

impl Edge {
    pub fn new(n1: impl Into<String>, n2: impl Into<String>, id: EdgeId, length: Distance) -> Self {
        Self {
            n1: n1.into(),
            n2: n2.into(),
            id,
            length,
        }
    }

    /// The opposite half of the same connection.
    pub fn reversed(&self) -> Self {
        Self {
            n1: self.n2.clone(),
            n2: self.n1.clone(),
            id: self.id.clone(),
            length: self.length,
        }
    }

    /// True if this edge touches both `a` and `b`, in either direction.
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.n1 == a && self.n2 == b) || (self.n1 == b && self.n2 == a)
    }
}

/// Adjacency list keyed by node, each node holding its outgoing half-edges in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    adjacency: HashMap<String, Vec<Edge>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node without edges. Existing nodes are left untouched.
    pub fn add_node(&mut self, node: impl Into<String>) {
        self.adjacency.entry(node.into()).or_default();
    }

    /// Adds a single directed half-edge, registering both endpoints.
    pub fn add_edge(&mut self, edge: Edge) {
        self.add_node(edge.n2.clone());
        self.adjacency.entry(edge.n1.clone()).or_default().push(edge);
    }

    /// Adds both half-edges of an undirected connection.
    pub fn add_undirected(&mut self, edge: Edge) {
        let reversed = edge.reversed();
        self.add_edge(edge);
        self.add_edge(reversed);
    }

    /// Removes every half-edge carrying `id`. Returns whether anything was removed.
    pub fn remove_edge(&mut self, id: &EdgeId) -> bool {
        let mut removed = false;
        for edges in self.adjacency.values_mut() {
            let before = edges.len();
            edges.retain(|edge| &edge.id != id);
            removed |= edges.len() != before;
        }
        removed
    }

    /// Outgoing half-edges of `node`; empty for unknown nodes.
    pub fn neighbors(&self, node: &str) -> &[Edge] {
        self.adjacency
            .get(node)
            .map(|edges| edges.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_node(&self, node: &str) -> bool {
        self.adjacency.contains_key(node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &String> {
        self.adjacency.keys()
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of directed half-edges.
    pub fn half_edge_count(&self) -> usize {
        self.adjacency.values().map(|edges| edges.len()).sum()
    }
}
