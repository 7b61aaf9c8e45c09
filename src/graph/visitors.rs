use super::engine::Visitor;
use super::types::{Distance, DistanceMap};

use std::collections::HashMap;
use thiserror::Error;

/// Records the shortest distance of every visited node.
#[derive(Debug, Clone, Default)]
pub struct DistanceCollector {
    distances: DistanceMap,
}

impl DistanceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: &str) -> Option<Distance> {
        self.distances.get(node).copied()
    }

    pub fn distances(&self) -> &DistanceMap {
        &self.distances
    }

    pub fn into_distances(self) -> DistanceMap {
        self.distances
    }
}

impl Visitor for DistanceCollector {
    fn visit(&mut self, node: &str, distance: Distance, _predecessor: Option<&str>) {
        // Under dijkstra the first visit is final; bfs may report a shorter one later.
        match self.distances.get_mut(node) {
            Some(known) if *known <= distance => {}
            Some(known) => *known = distance,
            None => {
                self.distances.insert(node.to_string(), distance);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("target {target} was never reached from {source_node}")]
    Unreached { source_node: String, target: String },
    #[error("predecessor chain broken at {node}")]
    BrokenChain { node: String },
}

/// Shortest-path tree towards one target.
///
/// Stores the predecessor of every visited node and freezes the distance once `target`
/// is settled. `reconstruct` walks the predecessors back from the target.
#[derive(Debug, Clone)]
pub struct PathRecord {
    source: String,
    target: String,
    predecessors: HashMap<String, String>,
    distance: Option<Distance>,
}

impl PathRecord {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            predecessors: HashMap::new(),
            distance: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Distance to the target, or `None` if the search never reached it.
    pub fn distance(&self) -> Option<Distance> {
        self.distance
    }

    /// Ordered nodes from source to target.
    ///
    /// Fails with `Unreached` when the target was never settled. The walk is bounded by
    /// the number of recorded predecessors, so a malformed chain is reported instead of
    /// looping.
    pub fn reconstruct(&self) -> Result<Vec<String>, PathError> {
        if self.distance.is_none() {
            return Err(PathError::Unreached {
                source_node: self.source.clone(),
                target: self.target.clone(),
            });
        }

        let mut path = vec![self.target.clone()];
        let mut current = &self.target;

        while current != &self.source {
            if path.len() > self.predecessors.len() + 1 {
                return Err(PathError::BrokenChain {
                    node: current.clone(),
                });
            }

            match self.predecessors.get(current) {
                Some(previous) => {
                    path.push(previous.clone());
                    current = previous;
                }
                None => {
                    return Err(PathError::BrokenChain {
                        node: current.clone(),
                    });
                }
            }
        }

        path.reverse();
        Ok(path)
    }
}

impl Visitor for PathRecord {
    fn visit(&mut self, node: &str, distance: Distance, predecessor: Option<&str>) {
        match predecessor {
            Some(previous) => {
                self.predecessors
                    .insert(node.to_string(), previous.to_string());
            }
            None => {
                self.predecessors.remove(node);
            }
        }

        if node == self.target {
            self.distance = Some(distance);
        }
    }
}
