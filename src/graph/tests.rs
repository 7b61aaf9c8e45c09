//! Graph Engine Tests
//!
//! ## Test Scopes
//! - **Scenarios**: Small hand-checked triangles for both traversal orders and both visitors.
//! - **Edge Cases**: Unreachable targets, trivial paths, seeds and edge removal.
//! - **Properties**: Random graphs cross-checked against brute-force all-pairs distances.

#[cfg(test)]
mod tests {
    use crate::graph::engine::{Visitor, bfs, dijkstra, multi_source_dijkstra};
    use crate::graph::types::{Distance, DistanceMap, Edge, EdgeId, Graph};
    use crate::graph::visitors::{DistanceCollector, PathError, PathRecord};
    use proptest::prelude::*;

    fn triangle(v1_v3: Distance) -> Graph {
        let mut graph = Graph::new();
        graph.add_undirected(Edge::new("v1", "v2", EdgeId("e1".into()), 2));
        graph.add_undirected(Edge::new("v1", "v3", EdgeId("e2".into()), v1_v3));
        graph.add_undirected(Edge::new("v2", "v3", EdgeId("e3".into()), 1));
        graph
    }

    fn expected(pairs: &[(&str, Distance)]) -> DistanceMap {
        pairs
            .iter()
            .map(|(node, distance)| (node.to_string(), *distance))
            .collect()
    }

    // ============================================================
    // SCENARIOS - distance collection
    // ============================================================

    #[test]
    fn test_bfs_distances_triangle() {
        let graph = triangle(4);
        let mut collector = DistanceCollector::new();

        bfs("v1", &graph, &mut collector);

        assert_eq!(
            collector.distances(),
            &expected(&[("v1", 0), ("v2", 2), ("v3", 3)])
        );
    }

    #[test]
    fn test_bfs_distances_triangle_with_short_side() {
        let graph = triangle(1);
        let mut collector = DistanceCollector::new();

        bfs("v1", &graph, &mut collector);

        assert_eq!(
            collector.distances(),
            &expected(&[("v1", 0), ("v2", 2), ("v3", 1)])
        );
    }

    #[test]
    fn test_dijkstra_distances_triangle() {
        let graph = triangle(4);
        let mut collector = DistanceCollector::new();

        dijkstra("v1", &graph, &mut collector);

        assert_eq!(
            collector.into_distances(),
            expected(&[("v1", 0), ("v2", 2), ("v3", 3)])
        );
    }

    #[test]
    fn test_dijkstra_distances_triangle_with_short_side() {
        let graph = triangle(1);
        let mut collector = DistanceCollector::new();

        dijkstra("v1", &graph, &mut collector);

        assert_eq!(
            collector.into_distances(),
            expected(&[("v1", 0), ("v2", 2), ("v3", 1)])
        );
    }

    // ============================================================
    // SCENARIOS - path reconstruction
    // ============================================================

    #[test]
    fn test_path_through_middle_node() {
        let graph = triangle(4);
        let mut record = PathRecord::new("v1", "v3");

        dijkstra("v1", &graph, &mut record);

        assert_eq!(record.distance(), Some(3));
        assert_eq!(record.reconstruct().unwrap(), vec!["v1", "v2", "v3"]);
    }

    #[test]
    fn test_path_direct_edge() {
        let graph = triangle(1);
        let mut record = PathRecord::new("v1", "v3");

        dijkstra("v1", &graph, &mut record);

        assert_eq!(record.distance(), Some(1));
        assert_eq!(record.reconstruct().unwrap(), vec!["v1", "v3"]);
    }

    #[test]
    fn test_path_with_bfs_matches_dijkstra() {
        let graph = triangle(4);
        let mut record = PathRecord::new("v1", "v3");

        bfs("v1", &graph, &mut record);

        assert_eq!(record.distance(), Some(3));
        assert_eq!(record.reconstruct().unwrap(), vec!["v1", "v2", "v3"]);
    }

    // ============================================================
    // EDGE CASES
    // ============================================================

    #[test]
    fn test_unreachable_target_fails_reconstruction() {
        let mut graph = triangle(4);
        graph.add_node("island");
        let mut record = PathRecord::new("v1", "island");

        dijkstra("v1", &graph, &mut record);

        assert_eq!(record.distance(), None);
        assert_eq!(
            record.reconstruct(),
            Err(PathError::Unreached {
                source_node: "v1".to_string(),
                target: "island".to_string(),
            })
        );
    }

    #[test]
    fn test_unknown_target_fails_reconstruction() {
        let graph = triangle(4);
        let mut record = PathRecord::new("v1", "nowhere");

        dijkstra("v1", &graph, &mut record);

        assert!(matches!(
            record.reconstruct(),
            Err(PathError::Unreached { .. })
        ));
    }

    #[test]
    fn test_source_equals_target() {
        let graph = triangle(4);
        let mut record = PathRecord::new("v2", "v2");

        dijkstra("v2", &graph, &mut record);

        assert_eq!(record.distance(), Some(0));
        assert_eq!(record.reconstruct().unwrap(), vec!["v2"]);
    }

    #[test]
    fn test_search_from_unknown_node_visits_only_itself() {
        let graph = triangle(4);
        let mut collector = DistanceCollector::new();

        dijkstra("ghost", &graph, &mut collector);

        assert_eq!(collector.distances(), &expected(&[("ghost", 0)]));
    }

    #[test]
    fn test_dijkstra_visits_each_node_once() {
        struct Counter(Vec<String>);
        impl Visitor for Counter {
            fn visit(&mut self, node: &str, _distance: Distance, _predecessor: Option<&str>) {
                self.0.push(node.to_string());
            }
        }

        let graph = triangle(4);
        let mut counter = Counter(Vec::new());

        dijkstra("v1", &graph, &mut counter);

        // v3 is pushed twice (4 via v1, then 3 via v2); the stale entry must be skipped.
        assert_eq!(counter.0, vec!["v1", "v2", "v3"]);
    }

    #[test]
    fn test_multi_source_takes_best_seed() {
        let graph = triangle(4);
        let mut collector = DistanceCollector::new();
        let seeds = vec![("v1".to_string(), 10), ("v3".to_string(), 0)];

        multi_source_dijkstra(&seeds, &graph, &mut collector);

        assert_eq!(
            collector.into_distances(),
            expected(&[("v1", 3), ("v2", 1), ("v3", 0)])
        );
    }

    #[test]
    fn test_multi_source_duplicate_seed_keeps_minimum() {
        let graph = triangle(4);
        let mut collector = DistanceCollector::new();
        let seeds = vec![("v1".to_string(), 7), ("v1".to_string(), 5)];

        multi_source_dijkstra(&seeds, &graph, &mut collector);

        assert_eq!(collector.get("v1"), Some(5));
        assert_eq!(collector.get("v3"), Some(8));
    }

    #[test]
    fn test_remove_edge_drops_both_halves() {
        let mut graph = triangle(4);
        assert_eq!(graph.half_edge_count(), 6);

        assert!(graph.remove_edge(&EdgeId("e3".into())));
        assert_eq!(graph.half_edge_count(), 4);
        assert!(!graph.remove_edge(&EdgeId("e3".into())));

        let mut collector = DistanceCollector::new();
        dijkstra("v1", &graph, &mut collector);
        assert_eq!(collector.get("v3"), Some(4));
    }

    #[test]
    fn test_directed_edge_is_one_way() {
        let mut graph = Graph::new();
        graph.add_edge(Edge::new("a", "b", EdgeId::new(), 1));

        let mut from_b = DistanceCollector::new();
        dijkstra("b", &graph, &mut from_b);

        assert_eq!(from_b.get("a"), None);
        assert!(graph.contains_node("b"));
    }

    // ============================================================
    // PROPERTIES - brute-force cross-check
    // ============================================================

    const NODES: usize = 7;

    fn build(edges: &[(usize, usize, Distance)]) -> Graph {
        let mut graph = Graph::new();
        for node in 0..NODES {
            graph.add_node(format!("n{}", node));
        }
        for (i, (a, b, length)) in edges.iter().enumerate() {
            graph.add_undirected(Edge::new(
                format!("n{}", a),
                format!("n{}", b),
                EdgeId(format!("e{}", i)),
                *length,
            ));
        }
        graph
    }

    fn floyd_warshall(edges: &[(usize, usize, Distance)]) -> Vec<Vec<Option<Distance>>> {
        let mut dist = vec![vec![None; NODES]; NODES];
        for (node, row) in dist.iter_mut().enumerate() {
            row[node] = Some(0);
        }
        for &(a, b, length) in edges {
            for (x, y) in [(a, b), (b, a)] {
                if dist[x][y].is_none_or(|known| length < known) {
                    dist[x][y] = Some(length);
                }
            }
        }
        for k in 0..NODES {
            for i in 0..NODES {
                for j in 0..NODES {
                    if let (Some(ik), Some(kj)) = (dist[i][k], dist[k][j]) {
                        if dist[i][j].is_none_or(|known| ik + kj < known) {
                            dist[i][j] = Some(ik + kj);
                        }
                    }
                }
            }
        }
        dist
    }

    fn arb_edges() -> impl Strategy<Value = Vec<(usize, usize, Distance)>> {
        prop::collection::vec((0..NODES, 0..NODES, 0u64..20), 0..18)
    }

    proptest! {
        #[test]
        fn prop_dijkstra_matches_brute_force(edges in arb_edges(), source in 0..NODES) {
            let graph = build(&edges);
            let truth = floyd_warshall(&edges);
            let mut collector = DistanceCollector::new();

            dijkstra(&format!("n{}", source), &graph, &mut collector);

            for target in 0..NODES {
                prop_assert_eq!(collector.get(&format!("n{}", target)), truth[source][target]);
            }
        }

        #[test]
        fn prop_bfs_converges_to_brute_force(edges in arb_edges(), source in 0..NODES) {
            let graph = build(&edges);
            let truth = floyd_warshall(&edges);
            let mut collector = DistanceCollector::new();

            bfs(&format!("n{}", source), &graph, &mut collector);

            for target in 0..NODES {
                prop_assert_eq!(collector.get(&format!("n{}", target)), truth[source][target]);
            }
        }

        #[test]
        fn prop_reconstructed_path_is_valid(
            edges in arb_edges(),
            source in 0..NODES,
            target in 0..NODES,
        ) {
            let graph = build(&edges);
            let truth = floyd_warshall(&edges);
            let (source, target) = (format!("n{}", source), format!("n{}", target));
            let mut record = PathRecord::new(source.clone(), target.clone());

            dijkstra(&source, &graph, &mut record);

            match record.reconstruct() {
                Ok(path) => {
                    prop_assert_eq!(path.first(), Some(&source));
                    prop_assert_eq!(path.last(), Some(&target));

                    let mut total = 0;
                    for pair in path.windows(2) {
                        let shortest_link = graph
                            .neighbors(&pair[0])
                            .iter()
                            .filter(|edge| edge.n2 == pair[1])
                            .map(|edge| edge.length)
                            .min();
                        prop_assert!(shortest_link.is_some(), "no edge {:?}", pair);
                        total += shortest_link.unwrap();
                    }
                    prop_assert_eq!(Some(total), record.distance());
                    prop_assert_eq!(record.distance(), truth_of(&truth, &source, &target));
                }
                Err(err) => {
                    let unreached = matches!(err, PathError::Unreached { .. });
                    prop_assert!(unreached, "unexpected error {:?}", err);
                    prop_assert_eq!(truth_of(&truth, &source, &target), None);
                }
            }
        }
    }

    fn truth_of(truth: &[Vec<Option<Distance>>], source: &str, target: &str) -> Option<Distance> {
        let index = |node: &str| node[1..].parse::<usize>().unwrap();
        truth[index(source)][index(target)]
    }
}
