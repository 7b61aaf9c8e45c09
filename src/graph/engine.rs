//! Single- and multi-source search.
//!
//! All three entry points share one relaxation loop and differ only in the frontier order:
//! `bfs` drains a FIFO queue, the Dijkstra variants a min-heap ordered by tentative distance
//! (ties broken by node name so results are deterministic).

use super::types::{Distance, Graph};

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};

/// Receives every node the search settles.
///
/// `predecessor` is `None` for source nodes. Under `dijkstra` each reachable node is
/// visited exactly once, with its final distance. Under `bfs` a node may be visited
/// again whenever a strictly shorter distance is found, so visitors must let the
/// latest visit win.
pub trait Visitor {
    fn visit(&mut self, node: &str, distance: Distance, predecessor: Option<&str>);
}

type Entry = (Distance, String, Option<String>);

trait Frontier {
    fn push(&mut self, entry: Entry);
    fn pop(&mut self) -> Option<Entry>;
}

#[derive(Default)]
struct FifoFrontier(VecDeque<Entry>);

impl Frontier for FifoFrontier {
    fn push(&mut self, entry: Entry) {
        self.0.push_back(entry);
    }

    fn pop(&mut self) -> Option<Entry> {
        self.0.pop_front()
    }
}

#[derive(Default)]
struct MinFrontier(BinaryHeap<Reverse<Entry>>);

impl Frontier for MinFrontier {
    fn push(&mut self, entry: Entry) {
        self.0.push(Reverse(entry));
    }

    fn pop(&mut self) -> Option<Entry> {
        self.0.pop().map(|Reverse(entry)| entry)
    }
}

/// Breadth-first traversal from `start`, honouring edge lengths for bookkeeping.
///
/// With uniform lengths this settles nodes in the same order as `dijkstra`. With mixed
/// lengths it still converges on the correct distances, but nodes can be revisited as
/// shorter paths surface; prefer `dijkstra` for weighted graphs.
pub fn bfs<V: Visitor>(start: &str, graph: &Graph, visitor: &mut V) {
    search(
        FifoFrontier::default(),
        &[(start.to_string(), 0)],
        graph,
        visitor,
    );
}

/// Single-source shortest paths from `start`.
///
/// Runs until the frontier is empty, so every node reachable from `start` is visited.
pub fn dijkstra<V: Visitor>(start: &str, graph: &Graph, visitor: &mut V) {
    search(
        MinFrontier::default(),
        &[(start.to_string(), 0)],
        graph,
        visitor,
    );
}

/// Dijkstra seeded with several `(node, initial distance)` entries at once.
///
/// Equivalent to a single-source search from a virtual node joined to every seed by an
/// edge of the seed's initial distance. Duplicate seeds keep their smallest distance.
pub fn multi_source_dijkstra<V: Visitor>(
    sources: &[(String, Distance)],
    graph: &Graph,
    visitor: &mut V,
) {
    search(MinFrontier::default(), sources, graph, visitor);
}

fn search<F: Frontier, V: Visitor>(
    mut frontier: F,
    sources: &[(String, Distance)],
    graph: &Graph,
    visitor: &mut V,
) {
    let mut best: HashMap<String, Distance> = HashMap::new();

    for (node, distance) in sources {
        let improves = best.get(node).is_none_or(|&known| *distance < known);
        if improves {
            best.insert(node.clone(), *distance);
            frontier.push((*distance, node.clone(), None));
        }
    }

    while let Some((distance, node, predecessor)) = frontier.pop() {
        // Stale entry: a shorter distance was recorded after this one was pushed.
        if best.get(&node).is_some_and(|&known| distance > known) {
            continue;
        }

        visitor.visit(&node, distance, predecessor.as_deref());

        for edge in graph.neighbors(&node) {
            let candidate = distance.saturating_add(edge.length);
            let improves = best.get(&edge.n2).is_none_or(|&known| candidate < known);

            if improves {
                best.insert(edge.n2.clone(), candidate);
                frontier.push((candidate, edge.n2.clone(), Some(node.clone())));
            }
        }
    }
}
