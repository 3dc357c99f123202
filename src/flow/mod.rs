//! Flow graph phase: materialized requests → nodes, reduced edges, layout.

pub mod edges;
pub mod layout;
pub mod reduce;

use crate::config::TranslateConfig;
use crate::id::{Id, IdSource};
use crate::materialize::MaterializedEntry;
use crate::model::{Edge, EdgeHandle, Flow, Node, NodeKind, RequestNode};

use edges::RequestFacts;

pub const START_NODE_NAME: &str = "Start";

#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    /// Start node first, then request nodes in sorted order.
    pub nodes: Vec<Node>,
    pub request_nodes: Vec<RequestNode>,
    pub edges: Vec<Edge>,
}

pub fn build_flow_graph(
    flow: &Flow,
    entries: &[MaterializedEntry],
    config: &TranslateConfig,
    ids: &mut dyn IdSource,
) -> FlowGraph {
    let node_count = entries.len() + 1;

    let facts: Vec<RequestFacts<'_>> = entries
        .iter()
        .map(|e| RequestFacts {
            started_at: e.started_at,
            folder_path: &e.classification.folder_path,
            is_mutation: e.classification.is_mutation,
            requires_strict_ordering: e.classification.requires_strict_ordering,
            dependencies: &e.dependencies,
        })
        .collect();
    let candidates = edges::candidate_edges(&facts, config);
    let reduced = reduce::transitive_reduction(node_count, &candidates);
    tracing::debug!(
        candidates = candidates.len(),
        reduced = reduced.len(),
        "flow edges reduced"
    );

    let positions = layout::layout(
        node_count,
        &reduced,
        config.layout_column_width,
        config.layout_row_height,
    );

    let mut nodes = Vec::with_capacity(node_count);
    nodes.push(Node {
        id: ids.next_id(),
        flow_id: flow.id,
        name: START_NODE_NAME.into(),
        kind: NodeKind::Start,
        position_x: positions[0].x,
        position_y: positions[0].y,
    });
    let mut request_nodes = Vec::with_capacity(entries.len());
    for (k, entry) in entries.iter().enumerate() {
        let position = positions[k + 1];
        let node = Node {
            id: ids.next_id(),
            flow_id: flow.id,
            name: entry.node_name.clone(),
            kind: NodeKind::Request,
            position_x: position.x,
            position_y: position.y,
        };
        request_nodes.push(RequestNode {
            flow_node_id: node.id,
            http_id: entry.base.id,
            delta_http_id: entry.delta.id,
        });
        nodes.push(node);
    }

    let node_ids: Vec<Id> = nodes.iter().map(|n| n.id).collect();
    let edges = reduced
        .iter()
        .map(|&(u, v)| Edge {
            id: ids.next_id(),
            flow_id: flow.id,
            source_id: node_ids[u],
            target_id: node_ids[v],
            handle: EdgeHandle::Unspecified,
        })
        .collect();

    FlowGraph {
        nodes,
        request_nodes,
        edges,
    }
}
