//! Horizontal DAG layout.
//!
//! A node's column is its longest distance from the start node; rows within a
//! column are centered on y = 0 and ordered by graph position.

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Longest distance from node 0 for every node.
pub fn levels(node_count: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::with_capacity(node_count, edges.len());
    for node in 0..node_count {
        graph.add_node(node);
    }
    for &(u, v) in edges {
        graph.add_edge(u, v, ());
    }

    // Generated edges only point forward, so a cycle cannot occur; position
    // order is the fallback.
    let order = toposort(&graph, None).unwrap_or_else(|_| (0..node_count).collect());

    let mut level = vec![0usize; node_count];
    for current in order {
        for next in graph.neighbors(current) {
            level[next] = level[next].max(level[current] + 1);
        }
    }
    level
}

pub fn layout(
    node_count: usize,
    edges: &[(usize, usize)],
    column_width: f64,
    row_height: f64,
) -> Vec<Position> {
    let level = levels(node_count, edges);
    let columns = level.iter().copied().max().map_or(0, |m| m + 1);

    let mut by_level: Vec<Vec<usize>> = vec![Vec::new(); columns];
    for (node, &l) in level.iter().enumerate() {
        by_level[l].push(node);
    }

    let mut positions = vec![Position { x: 0.0, y: 0.0 }; node_count];
    for (l, nodes) in by_level.iter().enumerate() {
        let total_height = (nodes.len().saturating_sub(1)) as f64 * row_height;
        for (k, &node) in nodes.iter().enumerate() {
            positions[node] = Position {
                x: l as f64 * column_width,
                y: -total_height / 2.0 + k as f64 * row_height,
            };
        }
    }
    positions
}
