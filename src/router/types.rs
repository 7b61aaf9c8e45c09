use crate::graph::types::{Distance, Edge};

use serde::{Deserialize, Serialize};

/// Federation-level snapshot: every edge whose endpoints live in different shards.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterShardEdges {
    pub edges: Vec<Edge>,
}

/// A concrete route, both endpoints included.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    pub distance: Distance,
    pub path: Vec<String>,
}
