//! Transitive reduction of the candidate edge set.

use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;

/// Remove every edge `u → v` for which another path `u → … → v` exists.
///
/// Edges are examined in ascending `(source, target)` order and each removal
/// is visible to later checks, so the result is deterministic. The output
/// keeps that order.
pub fn transitive_reduction(node_count: usize, edges: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut sorted: Vec<(usize, usize)> = edges.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::with_capacity(node_count, sorted.len());
    for node in 0..node_count {
        graph.add_node(node);
    }
    for &(u, v) in &sorted {
        graph.add_edge(u, v, ());
    }

    let mut kept = Vec::with_capacity(sorted.len());
    for &(u, v) in &sorted {
        graph.remove_edge(u, v);
        if has_path_connecting(&graph, u, v, None) {
            continue;
        }
        graph.add_edge(u, v, ());
        kept.push((u, v));
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_shortcut_edge() {
        // start → A, A → B, B → C, plus shortcut A → C
        let edges = vec![(0, 1), (1, 2), (2, 3), (1, 3)];
        assert_eq!(transitive_reduction(4, &edges), vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn diamond_is_kept() {
        let edges = vec![(0, 1), (0, 2), (1, 3), (2, 3)];
        assert_eq!(transitive_reduction(4, &edges), edges);
    }

    #[test]
    fn long_shortcut_removed_and_duplicates_collapsed() {
        let edges = vec![(0, 1), (1, 2), (2, 3), (3, 4), (0, 4), (0, 4), (0, 2)];
        assert_eq!(
            transitive_reduction(5, &edges),
            vec![(0, 1), (1, 2), (2, 3), (3, 4)]
        );
    }

    #[test]
    fn empty_graph() {
        assert!(transitive_reduction(1, &[]).is_empty());
    }
}
